//! Row access shared by the borrowed and owned gray images.

pub trait ImageView {
    type Pixel: Copy;

    fn width(&self) -> usize;
    fn height(&self) -> usize;

    fn row(&self, y: usize) -> &[Self::Pixel];

    #[inline]
    fn pixel(&self, x: usize, y: usize) -> Self::Pixel {
        self.row(y)[x]
    }

    /// True when the `size × size` window whose top-left corner is
    /// `(x0, y0)` lies inside the image.
    #[inline]
    fn contains_window(&self, x0: isize, y0: isize, size: usize) -> bool {
        x0 >= 0
            && y0 >= 0
            && (x0 as usize) + size <= self.width()
            && (y0 as usize) + size <= self.height()
    }
}
