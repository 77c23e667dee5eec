mod discriminator;
mod goertzel;
mod sweep;

pub use self::{
    discriminator::{
        FrequencyDiscriminator,
        Moments,
    },
    goertzel::Goertzel,
    sweep::SweepDemodulator,
};
