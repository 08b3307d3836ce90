/// Stores two values side by side and hands out access to each.
///
/// Zero-sized members take up no space, so pairing a pointer with a stateless policy object
/// costs nothing beyond the pointer itself.
///
/// # Example
///
/// ```
/// use owning_ptr::{CompressedPair, DefaultDelete};
///
/// let mut pair = CompressedPair::new(5_u64, DefaultDelete);
/// *pair.first_mut() += 1;
///
/// assert_eq!(*pair.first(), 6);
/// assert_eq!(size_of_val(&pair), size_of::<u64>());
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct CompressedPair<F, S> {
    first: F,
    second: S,
}

impl<F, S> CompressedPair<F, S> {
    /// Creates a pair from its two members.
    #[must_use]
    pub const fn new(first: F, second: S) -> Self {
        Self { first, second }
    }

    /// The first member.
    #[must_use]
    pub const fn first(&self) -> &F {
        &self.first
    }

    /// The first member, mutably.
    #[must_use]
    pub const fn first_mut(&mut self) -> &mut F {
        &mut self.first
    }

    /// The second member.
    #[must_use]
    pub const fn second(&self) -> &S {
        &self.second
    }

    /// The second member, mutably.
    #[must_use]
    pub const fn second_mut(&mut self) -> &mut S {
        &mut self.second
    }

    /// Splits the pair into its members.
    #[must_use]
    pub fn into_parts(self) -> (F, S) {
        (self.first, self.second)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn members_are_independent() {
        let mut pair = CompressedPair::new("left".to_string(), 7_i32);

        pair.first_mut().push('!');
        *pair.second_mut() -= 10;

        assert_eq!(pair.first(), "left!");
        assert_eq!(*pair.second(), -3);

        let (first, second) = pair.into_parts();
        assert_eq!(first, "left!");
        assert_eq!(second, -3);
    }

    #[test]
    fn zero_sized_member_takes_no_space() {
        assert_eq!(size_of::<CompressedPair<usize, ()>>(), size_of::<usize>());
        assert_eq!(size_of::<CompressedPair<(), usize>>(), size_of::<usize>());
    }
}
