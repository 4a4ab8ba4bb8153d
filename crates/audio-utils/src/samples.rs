use crate::{f32_to_i16_samples, f64_to_i16_samples};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    I16,
    F32,
    F64,
    I32,
    U8,
}

impl SampleFormat {
    pub fn is_canonical(self) -> bool {
        matches!(self, SampleFormat::I16 | SampleFormat::F32 | SampleFormat::F64)
    }
}

/// Mono PCM in whatever format a producer emitted it.
///
/// `I16` is the canonical format. Floats are expected in `[-1, 1]` and are
/// scaled and clipped. `I32` and `U8` have no agreed scaling and are cast
/// sample by sample, which may produce audible artifacts.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    I16(Vec<i16>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    U8(Vec<u8>),
}

impl Samples {
    pub fn format(&self) -> SampleFormat {
        match self {
            Samples::I16(_) => SampleFormat::I16,
            Samples::F32(_) => SampleFormat::F32,
            Samples::F64(_) => SampleFormat::F64,
            Samples::I32(_) => SampleFormat::I32,
            Samples::U8(_) => SampleFormat::U8,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Samples::I16(s) => s.len(),
            Samples::F32(s) => s.len(),
            Samples::F64(s) => s.len(),
            Samples::I32(s) => s.len(),
            Samples::U8(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_i16(self) -> Vec<i16> {
        let format = self.format();
        if !format.is_canonical() {
            tracing::warn!(?format, "coercing_unknown_sample_format");
        }

        match self {
            Samples::I16(s) => s,
            Samples::F32(s) => f32_to_i16_samples(&s),
            Samples::F64(s) => f64_to_i16_samples(&s),
            Samples::I32(s) => s.into_iter().map(|v| v as i16).collect(),
            Samples::U8(s) => s.into_iter().map(i16::from).collect(),
        }
    }

    /// Concatenate fragments in the given order. Fragments sharing one
    /// format stay in that format; mixed formats are normalized to `I16`
    /// fragment by fragment first.
    pub fn concat(fragments: Vec<Samples>) -> Samples {
        let Some(first) = fragments.first() else {
            return Samples::I16(Vec::new());
        };
        let format = first.format();

        if fragments.iter().all(|f| f.format() == format) {
            let mut iter = fragments.into_iter();
            let Some(mut acc) = iter.next() else {
                return Samples::I16(Vec::new());
            };
            for next in iter {
                acc.extend_same(next);
            }
            return acc;
        }

        let total = fragments.iter().map(Samples::len).sum();
        let mut out = Vec::with_capacity(total);
        for fragment in fragments {
            out.extend(fragment.into_i16());
        }
        Samples::I16(out)
    }

    /// Split into consecutive pieces of at most `chunk_len` samples.
    pub fn chunks(self, chunk_len: usize) -> Vec<Samples> {
        fn split<T: Clone>(values: Vec<T>, n: usize, wrap: fn(Vec<T>) -> Samples) -> Vec<Samples> {
            values.chunks(n).map(|c| wrap(c.to_vec())).collect()
        }

        let n = chunk_len.max(1);
        match self {
            Samples::I16(s) => split(s, n, Samples::I16),
            Samples::F32(s) => split(s, n, Samples::F32),
            Samples::F64(s) => split(s, n, Samples::F64),
            Samples::I32(s) => split(s, n, Samples::I32),
            Samples::U8(s) => split(s, n, Samples::U8),
        }
    }

    fn extend_same(&mut self, other: Samples) {
        match (self, other) {
            (Samples::I16(a), Samples::I16(b)) => a.extend(b),
            (Samples::F32(a), Samples::F32(b)) => a.extend(b),
            (Samples::F64(a), Samples::F64(b)) => a.extend(b),
            (Samples::I32(a), Samples::I32(b)) => a.extend(b),
            (Samples::U8(a), Samples::U8(b)) => a.extend(b),
            _ => unreachable!("extend_same called with mismatched formats"),
        }
    }
}

impl From<Vec<i16>> for Samples {
    fn from(value: Vec<i16>) -> Self {
        Samples::I16(value)
    }
}

impl From<Vec<f32>> for Samples {
    fn from(value: Vec<f32>) -> Self {
        Samples::F32(value)
    }
}

impl From<Vec<f64>> for Samples {
    fn from(value: Vec<f64>) -> Self {
        Samples::F64(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn i16_passes_through() {
        assert_eq!(Samples::I16(vec![1, -2, 3]).into_i16(), vec![1, -2, 3]);
    }

    #[test]
    fn floats_are_scaled() {
        assert_eq!(Samples::F32(vec![1.0, -1.0]).into_i16(), vec![32767, -32767]);
        assert_eq!(Samples::F64(vec![0.0, 3.0]).into_i16(), vec![0, 32767]);
    }

    #[traced_test]
    #[test]
    fn other_formats_are_coerced_with_warning() {
        assert_eq!(Samples::I32(vec![5, -5]).into_i16(), vec![5, -5]);
        assert!(logs_contain("coercing_unknown_sample_format"));
    }

    #[test]
    fn concat_keeps_shared_format() {
        let joined = Samples::concat(vec![
            Samples::F32(vec![0.5]),
            Samples::F32(vec![0.25, 1.0]),
        ]);
        assert_eq!(joined, Samples::F32(vec![0.5, 0.25, 1.0]));
    }

    #[test]
    fn concat_normalizes_mixed_formats_in_order() {
        let joined = Samples::concat(vec![
            Samples::I16(vec![7]),
            Samples::F32(vec![1.0]),
            Samples::I16(vec![-7]),
        ]);
        assert_eq!(joined, Samples::I16(vec![7, 32767, -7]));
    }

    #[test]
    fn chunks_keep_format_and_order() {
        let pieces = Samples::F32(vec![0.1, 0.2, 0.3]).chunks(2);
        assert_eq!(
            pieces,
            vec![Samples::F32(vec![0.1, 0.2]), Samples::F32(vec![0.3])]
        );
        assert_eq!(Samples::concat(pieces), Samples::F32(vec![0.1, 0.2, 0.3]));
        assert!(Samples::I16(vec![]).chunks(4).is_empty());
    }

    #[test]
    fn concat_of_nothing_is_empty() {
        assert!(Samples::concat(vec![]).is_empty());
    }
}
