// THEORY:
// The `grid` module holds the "dumb" data containers every other module works
// on. None of them know anything about similarity; they only know their own
// geometry and how to hand out their samples.
//
// Key architectural principles:
// 1.  **One Layout**: An `Image` is a flat, row-major (height, width, channel)
//     buffer of `f64`. Whatever the caller decoded (8-bit, 16-bit, float) is
//     widened on the way in, so no arithmetic ever runs in the storage type.
// 2.  **Planes for Convolution**: A `Plane` is a single-channel 2-D slice. The
//     convolver only accepts planes, so the "more than two dimensions" check is
//     the conversion from `Image` to `Plane`.
// 3.  **Immutable Windows**: A `Window` is built once per comparison and then
//     only read, shared by every channel of both images.

pub mod grid {
    use crate::core_modules::error::{SsimError, SsimResult};
    use std::fmt;

    /// The logical (height, width, channels) extent of an `Image`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Shape {
        pub height: usize,
        pub width: usize,
        pub channels: usize,
    }

    impl Shape {
        pub fn new(height: usize, width: usize, channels: usize) -> Self {
            Self {
                height,
                width,
                channels,
            }
        }

        /// Number of samples a buffer of this shape holds.
        pub fn len(&self) -> usize {
            self.height * self.width * self.channels
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    impl fmt::Display for Shape {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "({}, {}, {})", self.height, self.width, self.channels)
        }
    }

    /// A height x width x channels grid of floating-point samples, stored row-major
    /// with channels interleaved.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Image {
        shape: Shape,
        data: Vec<f64>,
    }

    impl Image {
        pub fn new(height: usize, width: usize, channels: usize, data: Vec<f64>) -> SsimResult<Self> {
            let shape = Shape::new(height, width, channels);
            if shape.is_empty() {
                return Err(SsimError::InvalidArgument(format!(
                    "image dimensions must be non-zero, got {shape}"
                )));
            }
            if data.len() != shape.len() {
                return Err(SsimError::InvalidArgument(format!(
                    "image of shape {shape} needs {} samples, got {}",
                    shape.len(),
                    data.len()
                )));
            }
            Ok(Self { shape, data })
        }

        /// Widens samples of any numeric storage type into a floating-point image.
        pub fn from_samples<T>(height: usize, width: usize, channels: usize, samples: &[T]) -> SsimResult<Self>
        where
            T: Copy + Into<f64>,
        {
            let data = samples.iter().map(|&sample| sample.into()).collect();
            Self::new(height, width, channels, data)
        }

        /// An image with every sample set to `value`.
        pub fn filled(height: usize, width: usize, channels: usize, value: f64) -> SsimResult<Self> {
            Self::new(height, width, channels, vec![value; height * width * channels])
        }

        /// Builds an image by evaluating `f(y, x, channel)` for every sample.
        pub fn from_fn<F>(height: usize, width: usize, channels: usize, mut f: F) -> SsimResult<Self>
        where
            F: FnMut(usize, usize, usize) -> f64,
        {
            let mut data = Vec::with_capacity(height * width * channels);
            for y in 0..height {
                for x in 0..width {
                    for c in 0..channels {
                        data.push(f(y, x, c));
                    }
                }
            }
            Self::new(height, width, channels, data)
        }

        /// Stacks single-channel planes back into one image, in the order given.
        pub fn from_planes(planes: &[Plane]) -> SsimResult<Self> {
            let first = planes
                .first()
                .ok_or_else(|| SsimError::InvalidArgument("cannot stack zero planes".to_string()))?;
            let (height, width) = (first.height(), first.width());
            if let Some(odd) = planes.iter().find(|p| p.height() != height || p.width() != width) {
                return Err(SsimError::Dimension(format!(
                    "cannot stack a {}x{} plane with a {}x{} plane",
                    odd.height(),
                    odd.width(),
                    height,
                    width
                )));
            }

            let channels = planes.len();
            let mut data = Vec::with_capacity(height * width * channels);
            for i in 0..height * width {
                for plane in planes {
                    data.push(plane.data()[i]);
                }
            }
            Self::new(height, width, channels, data)
        }

        pub fn shape(&self) -> Shape {
            self.shape
        }

        pub fn height(&self) -> usize {
            self.shape.height
        }

        pub fn width(&self) -> usize {
            self.shape.width
        }

        pub fn channels(&self) -> usize {
            self.shape.channels
        }

        pub fn data(&self) -> &[f64] {
            &self.data
        }

        pub fn into_data(self) -> Vec<f64> {
            self.data
        }

        /// The sample at row `y`, column `x`, channel `c`.
        ///
        /// # Panics
        ///
        /// Panics if any index is outside the image's shape. Use `checked_get`
        /// when the indices are not known to be in range.
        pub fn get(&self, y: usize, x: usize, c: usize) -> f64 {
            match self.checked_get(y, x, c) {
                Some(sample) => sample,
                None => panic!("sample ({y}, {x}, {c}) is outside an image of shape {}", self.shape),
            }
        }

        /// The sample at row `y`, column `x`, channel `c`, or `None` when out of range.
        pub fn checked_get(&self, y: usize, x: usize, c: usize) -> Option<f64> {
            if y < self.shape.height && x < self.shape.width && c < self.shape.channels {
                Some(self.data[(y * self.shape.width + x) * self.shape.channels + c])
            } else {
                None
            }
        }

        /// Copies one channel out as its own plane.
        pub fn channel(&self, c: usize) -> SsimResult<Plane> {
            if c >= self.shape.channels {
                return Err(SsimError::InvalidArgument(format!(
                    "channel {c} out of range for image of shape {}",
                    self.shape
                )));
            }
            let data = self
                .data
                .iter()
                .skip(c)
                .step_by(self.shape.channels)
                .copied()
                .collect();
            Plane::new(self.shape.height, self.shape.width, data)
        }

        /// Combines two same-shaped images sample by sample.
        pub fn zip_map<F>(&self, other: &Image, f: F) -> SsimResult<Image>
        where
            F: Fn(f64, f64) -> f64,
        {
            if self.shape != other.shape {
                return Err(SsimError::ShapeMismatch {
                    left: self.shape,
                    right: other.shape,
                });
            }
            let data = self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(&a, &b)| f(a, b))
                .collect();
            Ok(Image {
                shape: self.shape,
                data,
            })
        }

        /// Arithmetic mean over every sample, summed in storage order.
        pub fn mean(&self) -> f64 {
            self.data.iter().sum::<f64>() / self.data.len() as f64
        }
    }

    impl From<Plane> for Image {
        fn from(plane: Plane) -> Self {
            Image {
                shape: Shape::new(plane.height, plane.width, 1),
                data: plane.data,
            }
        }
    }

    /// A single-channel, row-major 2-D grid.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Plane {
        height: usize,
        width: usize,
        data: Vec<f64>,
    }

    impl Plane {
        pub fn new(height: usize, width: usize, data: Vec<f64>) -> SsimResult<Self> {
            if height == 0 || width == 0 {
                return Err(SsimError::InvalidArgument(format!(
                    "plane dimensions must be non-zero, got {height}x{width}"
                )));
            }
            if data.len() != height * width {
                return Err(SsimError::InvalidArgument(format!(
                    "plane of {height}x{width} needs {} samples, got {}",
                    height * width,
                    data.len()
                )));
            }
            Ok(Self { height, width, data })
        }

        pub fn height(&self) -> usize {
            self.height
        }

        pub fn width(&self) -> usize {
            self.width
        }

        pub fn data(&self) -> &[f64] {
            &self.data
        }

        pub fn get(&self, y: usize, x: usize) -> f64 {
            self.data[y * self.width + x]
        }

        pub fn row(&self, y: usize) -> &[f64] {
            &self.data[y * self.width..(y + 1) * self.width]
        }
    }

    impl TryFrom<&Image> for Plane {
        type Error = SsimError;

        /// Only single-channel images are planes.
        fn try_from(image: &Image) -> SsimResult<Self> {
            if image.channels() != 1 {
                return Err(SsimError::Dimension(format!(
                    "expected a 2-D plane, got an image of shape {} with {} channels",
                    image.shape(),
                    image.channels()
                )));
            }
            Plane::new(image.height(), image.width(), image.data().to_vec())
        }
    }

    /// A 2-D weighting window: `size_y` rows of `size_x` weights.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Window {
        size_x: usize,
        size_y: usize,
        weights: Vec<f64>,
    }

    impl Window {
        pub fn from_weights(size_x: usize, size_y: usize, weights: Vec<f64>) -> SsimResult<Self> {
            if size_x == 0 || size_y == 0 {
                return Err(SsimError::InvalidArgument(format!(
                    "window sizes must be positive, got {size_x}x{size_y}"
                )));
            }
            if weights.len() != size_x * size_y {
                return Err(SsimError::InvalidArgument(format!(
                    "window of {size_x}x{size_y} needs {} weights, got {}",
                    size_x * size_y,
                    weights.len()
                )));
            }
            Ok(Self {
                size_x,
                size_y,
                weights,
            })
        }

        /// Columns.
        pub fn size_x(&self) -> usize {
            self.size_x
        }

        /// Rows.
        pub fn size_y(&self) -> usize {
            self.size_y
        }

        pub fn weights(&self) -> &[f64] {
            &self.weights
        }

        pub fn get(&self, row: usize, col: usize) -> f64 {
            self.weights[row * self.size_x + col]
        }

        pub fn sum(&self) -> f64 {
            self.weights.iter().sum()
        }
    }
}
