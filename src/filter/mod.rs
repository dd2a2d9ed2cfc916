//! FIR filter design and application.
//!
//! - [`design`]: Hamming-windowed sinc high-pass, low-pass, band-pass and
//!   band-stop design, matching `mne.filter.create_filter(fir_window='hamming',
//!   phase='zero')`.
//! - [`apply`]: Overlap-add zero-phase convolution, matching MNE's
//!   `_overlap_add_filter` / `_1d_overlap_filter`.

pub mod apply;
pub mod design;

pub use apply::{apply_fir_zero_phase, filter_1d};
pub use design::{
    auto_filter_length, auto_trans_bandwidth, auto_trans_bandwidth_low, design_bandpass,
    design_bandstop, design_highpass, design_lowpass, firwin, gain_at, hamming,
};
