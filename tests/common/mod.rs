use ndarray::Array;
use permutect::data::{MutectInfo, SiteInfo};
use permutect::{Datum, Label};

/// Datum with deterministic read features: ref values count up, alt values count down.
pub fn datum(
    position: u64,
    ref_count: usize,
    alt_count: usize,
    read_width: usize,
    info_width: usize,
    label: Option<Label>,
) -> Datum {
    Datum::new(
        Array::from_shape_fn((ref_count, read_width), |(i, j)| (i * read_width + j) as f32),
        Array::from_shape_fn((alt_count, read_width), |(i, j)| -((i + j) as f32)),
        Array::from_shape_fn(info_width, |j| (j as u64 + position) as f32),
        SiteInfo::new(
            "chr20".to_owned(),
            position,
            "C".to_owned(),
            "T".to_owned(),
            1e-4,
        ),
        MutectInfo::new(12.5, (ref_count + alt_count) as u32, 0.35),
        label,
        40,
        0,
    )
}
