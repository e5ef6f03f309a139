use std::fmt;
use std::str::FromStr;
use num::{NumCast, ToPrimitive};
use num_traits::CheckedMul;
use thiserror::Error;

/// Binary suffixes, largest first, with the power of two each one means.
const SUFFIXES : [(char, &str, u32); 4] = [('t', "TB", 40), ('g', "GB", 30), ('m', "MB", 20), ('k', "KB", 10)];

/// A byte count input by a user, such as a block size of `64k`.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct DataSize<I> {
    inner: I
}

impl<I> DataSize<I> {
    pub fn into_inner(self) -> I {
        self.inner
    }
}

impl<I> From<I> for DataSize<I> {
    fn from(inner: I) -> DataSize<I> {
        DataSize {
            inner: inner
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SizeError {
    #[error("empty size")]
    Empty,
    #[error("{0} is not a size")]
    Invalid(String),
    #[error("{0} is too large")]
    Overflow(String)
}

impl<I> FromStr for DataSize<I> where I: FromStr + NumCast + CheckedMul {
    type Err = SizeError;

    /// Parse a count of bytes, optionally suffixed with `k`, `m`, `g` or `t`
    /// (case-insensitive, powers of 1024).
    fn from_str(s: &str) -> Result<DataSize<I>, SizeError> {
        let s = s.trim();
        let last = match s.chars().last() {
            Some(c) => c.to_ascii_lowercase(),
            None => return Err(SizeError::Empty)
        };

        let (digits, shift) = match SUFFIXES.iter().find(|(suffix, _, _)| *suffix == last) {
            Some((_, _, shift)) => (&s[..s.len() - 1], *shift),
            None => (s, 0)
        };

        let count = I::from_str(digits).map_err(|_| SizeError::Invalid(s.to_string()))?;
        let factor : I = NumCast::from(1u64 << shift).ok_or_else(|| SizeError::Overflow(s.to_string()))?;

        match count.checked_mul(&factor) {
            Some(inner) => Ok(DataSize::from(inner)),
            None => Err(SizeError::Overflow(s.to_string()))
        }
    }
}

impl<I> fmt::Display for DataSize<I> where I: ToPrimitive {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self.inner.to_f64().ok_or(fmt::Error)?;

        for (_, name, shift) in SUFFIXES.iter() {
            let factor = (1u64 << shift) as f64;

            if bytes >= factor {
                return write!(f, "{:.2}{}", bytes / factor, name);
            }
        }

        write!(f, "{}B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::{DataSize, SizeError};

    #[test]
    fn suffixes() {
        assert_eq!("512".parse::<DataSize<usize>>().map(DataSize::into_inner), Ok(512));
        assert_eq!("64k".parse::<DataSize<usize>>().map(DataSize::into_inner), Ok(64 * 1024));
        assert_eq!("1M".parse::<DataSize<usize>>().map(DataSize::into_inner), Ok(1024 * 1024));
        assert_eq!("2g".parse::<DataSize<u64>>().map(DataSize::into_inner), Ok(2 * 1024 * 1024 * 1024));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!("".parse::<DataSize<usize>>(), Err(SizeError::Empty));
        assert_eq!("12q".parse::<DataSize<usize>>(), Err(SizeError::Invalid("12q".to_string())));
        assert_eq!("k".parse::<DataSize<usize>>(), Err(SizeError::Invalid("k".to_string())));
    }

    #[test]
    fn overflow_is_caught() {
        assert_eq!("8g".parse::<DataSize<u32>>(), Err(SizeError::Overflow("8g".to_string())));
        assert_eq!("1t".parse::<DataSize<u32>>(), Err(SizeError::Overflow("1t".to_string())));
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", DataSize::from(512u32)), "512B");
        assert_eq!(format!("{}", DataSize::from(1536u32)), "1.50KB");
        assert_eq!(format!("{}", DataSize::from(3u64 * 1024 * 1024 * 1024)), "3.00GB");
    }
}
