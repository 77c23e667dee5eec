use image::{
    Rgb,
    RgbImage,
};

use crate::{
    modem::sstv::{
        CHANNEL_HIGH_TONE,
        CHANNEL_LOW_TONE,
    },
    util::{
        lerp,
        unlerp,
    },
};

/// Color channels in transmission order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Channel {
    #[default]
    Green = 0,
    Blue = 1,
    Red = 2,
}

/// Bit offset of each channel in a `0xRRGGBB` word.
const CHANNEL_SHIFTS: [u32; 3] = [8, 0, 16];

/// Index into an `[r, g, b]` triple.
const CHANNEL_RGB_INDEX: [usize; 3] = [1, 2, 0];

const CHANNEL_BANDS: [FrequencyBand; 3] = [FrequencyBand::CHANNEL; 3];

impl Channel {
    pub const ALL: [Self; 3] = [Self::Green, Self::Blue, Self::Red];

    #[inline]
    pub fn next(self) -> Option<Self> {
        Self::ALL.get(self as usize + 1).copied()
    }

    #[inline]
    pub fn shift(self) -> u32 {
        CHANNEL_SHIFTS[self as usize]
    }

    #[inline]
    pub fn band(self) -> FrequencyBand {
        CHANNEL_BANDS[self as usize]
    }
}

/// Linear map between channel values and tone frequencies.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrequencyBand {
    pub low: f32,
    pub high: f32,
}

impl FrequencyBand {
    pub const CHANNEL: Self = Self {
        low: CHANNEL_LOW_TONE,
        high: CHANNEL_HIGH_TONE,
    };

    #[inline]
    pub fn frequency(&self, value: u8) -> f32 {
        lerp(f32::from(value) / 255.0, self.low, self.high)
    }

    /// Nearest channel value for `frequency`, saturating outside the band.
    #[inline]
    pub fn value(&self, frequency: f32) -> u8 {
        quantize(unlerp(frequency, self.low, self.high))
    }
}

/// Maps `[0, 1]` to `0..=255`, rounding and clamping.
#[inline]
pub fn quantize(x: f32) -> u8 {
    // NaN also ends up as 0
    (255.0 * x).round().clamp(0.0, 255.0) as u8
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Pixel {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Pixel {
    pub const BLACK: Self = Self::from_rgb([0, 0, 0]);

    /// Creates a pixel, clamping each channel to `0..=255`.
    #[inline]
    pub fn new(red: i32, green: i32, blue: i32) -> Self {
        Self {
            red: clamp_channel(red),
            green: clamp_channel(green),
            blue: clamp_channel(blue),
        }
    }

    #[inline]
    pub const fn from_rgb([red, green, blue]: [u8; 3]) -> Self {
        Self { red, green, blue }
    }

    #[inline]
    pub const fn to_rgb(self) -> [u8; 3] {
        [self.red, self.green, self.blue]
    }

    #[inline]
    pub const fn from_packed(packed: u32) -> Self {
        Self {
            red: (packed >> 16) as u8,
            green: (packed >> 8) as u8,
            blue: packed as u8,
        }
    }

    #[inline]
    pub fn to_packed(self) -> u32 {
        (u32::from(self.red) << 16) | (u32::from(self.green) << 8) | u32::from(self.blue)
    }

    #[inline]
    pub fn channel(self, channel: Channel) -> u8 {
        ((self.to_packed() >> channel.shift()) & 0xff) as u8
    }

    #[inline]
    pub fn set_channel(&mut self, channel: Channel, value: u8) {
        let mut rgb = self.to_rgb();
        rgb[CHANNEL_RGB_INDEX[channel as usize]] = value;
        *self = Self::from_rgb(rgb);
    }
}

#[inline]
pub fn clamp_channel(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

pub trait FrameBuffer {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn pixel(&self, x: usize, y: usize) -> Pixel;
}

impl<F> FrameBuffer for &F
where
    F: FrameBuffer,
{
    #[inline]
    fn width(&self) -> usize {
        (**self).width()
    }

    #[inline]
    fn height(&self) -> usize {
        (**self).height()
    }

    #[inline]
    fn pixel(&self, x: usize, y: usize) -> Pixel {
        (**self).pixel(x, y)
    }
}

impl FrameBuffer for RgbImage {
    #[inline]
    fn width(&self) -> usize {
        RgbImage::width(self) as usize
    }

    #[inline]
    fn height(&self) -> usize {
        RgbImage::height(self) as usize
    }

    #[inline]
    fn pixel(&self, x: usize, y: usize) -> Pixel {
        Pixel::from_rgb(self.get_pixel(x as u32, y as u32).0)
    }
}

/// Receives decoded pixels.
///
/// The decoder calls `reset` when a new frame starts and then `set_pixel` for
/// every pixel of every row, top to bottom.
pub trait FrameBufferMut {
    fn reset(&mut self, width: usize, height: usize);
    fn set_pixel(&mut self, x: usize, y: usize, pixel: Pixel);
}

impl<F> FrameBufferMut for &mut F
where
    F: FrameBufferMut,
{
    #[inline]
    fn reset(&mut self, width: usize, height: usize) {
        (**self).reset(width, height);
    }

    #[inline]
    fn set_pixel(&mut self, x: usize, y: usize, pixel: Pixel) {
        (**self).set_pixel(x, y, pixel);
    }
}

impl FrameBufferMut for RgbImage {
    fn reset(&mut self, width: usize, height: usize) {
        *self = RgbImage::new(width as u32, height as u32);
    }

    #[inline]
    fn set_pixel(&mut self, x: usize, y: usize, pixel: Pixel) {
        self.put_pixel(x as u32, y as u32, Rgb(pixel.to_rgb()));
    }
}
