//! Decoded analysis frames.

use crate::core::{CoreError, CoreResult};

/// One 8-bit grayscale frame, row-major with no padding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayFrame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl GrayFrame {
    /// Checked constructor: `data` must hold exactly `width * height` bytes.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> CoreResult<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(CoreError::InvalidInput(format!(
                "frame buffer holds {} bytes, expected {}x{} = {}",
                data.len(),
                width,
                height,
                expected
            )));
        }
        Ok(Self::from_raw(width, height, data))
    }

    /// Wraps a buffer already known to be `width * height` bytes.
    pub(crate) fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize);
        Self {
            width,
            height,
            data,
        }
    }

    /// Uniform frame, mostly useful for synthetic inputs.
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self::from_raw(width, height, vec![value; width as usize * height as usize])
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub(crate) fn pixel(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width as usize + x]
    }

    pub(crate) fn same_dimensions(&self, other: &GrayFrame) -> bool {
        self.width == other.width && self.height == other.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_length_is_checked() {
        assert!(GrayFrame::new(4, 4, vec![0; 16]).is_ok());
        assert!(matches!(
            GrayFrame::new(4, 4, vec![0; 15]),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn pixels_are_row_major() {
        let frame = GrayFrame::new(3, 2, vec![0, 1, 2, 3, 4, 5]).unwrap();
        assert_eq!(frame.pixel(2, 0), 2);
        assert_eq!(frame.pixel(0, 1), 3);
        assert_eq!(frame.pixel(2, 1), 5);
    }
}
