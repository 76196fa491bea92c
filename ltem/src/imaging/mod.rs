//! Image primitives feeding the significance stage: loading, histogram
//! equalization and Gaussian blur on 8-bit grids.


mod equalize;
mod gaussian;
mod io;

pub use equalize::equalize_histogram;
pub use gaussian::{gaussian_blur, gaussian_kernel_1d, odd_window, window_sigma};
pub use io::{is_pic_path, load_frame, load_image, load_pic, save_gray_png};
