//! The divot filter: removes single-pixel color spikes left over from the
//! AA color-sum stage by taking the component-wise median of three
//! consecutive samples.

use crate::cache::Ccvg;

fn median3(a: u8, b: u8, c: u8) -> u8 {
    a.max(b).min(a.min(b).max(c))
}

/// `center` is the sample the output replaces; `left`/`right` are its two
/// horizontal neighbors in source-column order.
#[must_use]
pub fn divot_filter(center: Ccvg, left: Ccvg, right: Ccvg) -> Ccvg {
    Ccvg {
        r: median3(center.r, left.r, right.r),
        g: median3(center.g, left.g, right.g),
        b: median3(center.b, left.b, right.b),
        cvg: center.cvg,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spike_is_clamped_to_neighbor_range() {
        let spike = Ccvg { r: 255, g: 0, b: 128, cvg: 4 };
        let left = Ccvg { r: 10, g: 10, b: 10, cvg: 4 };
        let right = Ccvg { r: 20, g: 20, b: 20, cvg: 4 };
        let out = divot_filter(spike, left, right);
        assert_eq!(out.r, 20);
        assert_eq!(out.g, 10);
        assert_eq!(out.b, 20);
        assert_eq!(out.cvg, 4);
    }

    #[test]
    fn monotone_run_is_unchanged() {
        let center = Ccvg { r: 50, g: 60, b: 70, cvg: 2 };
        let left = Ccvg { r: 40, g: 55, b: 65, cvg: 2 };
        let right = Ccvg { r: 60, g: 65, b: 75, cvg: 2 };
        let out = divot_filter(center, left, right);
        assert_eq!(out, center);
    }
}
