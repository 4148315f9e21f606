pub mod config;
pub mod error;
pub mod events;
pub mod processing {
    pub mod adjust;
}
pub mod render {
    pub mod glyphs;
    pub mod present;
    pub mod surface;
    pub mod worker;
}
pub mod sampler;
pub mod source;
pub mod tasks {
    pub mod coordinator;
    pub mod frame_rate;
    pub mod input;
}
pub mod viewport;
