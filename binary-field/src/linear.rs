use crate::BinaryField;

/// A GF(2)-linear map `F -> F`, stored as the images of the basis monomials.
///
/// Any linearized polynomial `sum a_i * x^(2^i)` is such a map. Applying the
/// map costs one conditional addition per basis bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearMap<F: BinaryField> {
    columns: Vec<F>,
}

impl<F: BinaryField> LinearMap<F> {
    /// Tabulate a map by evaluating `f` on every basis monomial.
    ///
    /// `f` must be GF(2)-linear; nothing checks this.
    pub fn from_fn(f: impl Fn(F) -> F) -> Self {
        Self {
            columns: (0..F::DEGREE).map(|i| f(F::monomial(i))).collect(),
        }
    }

    /// The identity map.
    pub fn identity() -> Self {
        Self::from_fn(|x| x)
    }

    /// Evaluate the map at `x`.
    pub fn apply(&self, x: F) -> F {
        self.columns
            .iter()
            .enumerate()
            .filter(|(i, _)| x.coefficient(*i))
            .fold(F::ZERO, |acc, (_, column)| acc + *column)
    }

    /// Invert the map by Gauss-Jordan elimination over GF(2).
    ///
    /// Column operations are mirrored on a copy of the identity, so that
    /// `self.apply(preimage[c]) == image[c]` holds throughout; once `image`
    /// is reduced to the basis, `preimage` holds the inverse.
    ///
    /// Returns `None` if the map is singular.
    pub fn inverse(&self) -> Option<Self> {
        let n = F::DEGREE;
        let mut image = self.columns.clone();
        let mut preimage: Vec<F> = (0..n).map(F::monomial).collect();

        for row in 0..n {
            let pivot = (row..n).find(|&c| image[c].coefficient(row))?;
            image.swap(row, pivot);
            preimage.swap(row, pivot);

            let (pivot_image, pivot_preimage) = (image[row], preimage[row]);
            for c in 0..n {
                if c != row && image[c].coefficient(row) {
                    image[c] += pivot_image;
                    preimage[c] += pivot_preimage;
                }
            }
        }

        Some(Self { columns: preimage })
    }

    /// Whether the map is a bijection.
    pub fn is_invertible(&self) -> bool {
        self.inverse().is_some()
    }
}
