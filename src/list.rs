//! Host-side nested sequences, the tensor's external list form.

use crate::error::Error;

/// A rectangular nested list of numbers. Rank-0 tensors map to [`NestedList::Scalar`].
#[derive(Debug, Clone, PartialEq)]
pub enum NestedList {
    Scalar(f32),
    List(Vec<NestedList>),
}

impl NestedList {
    /// Shape of a rectangular nesting; ragged input is a `ShapeMismatch`.
    pub fn shape(&self) -> Result<Vec<usize>, Error> {
        match self {
            NestedList::Scalar(_) => Ok(vec![]),
            NestedList::List(items) => {
                let mut shape = vec![items.len()];
                if let Some(first) = items.first() {
                    let inner = first.shape()?;
                    for item in &items[1..] {
                        let other = item.shape()?;
                        if other != inner {
                            return Err(Error::ShapeMismatch {
                                expected: inner,
                                actual: other,
                            });
                        }
                    }
                    shape.extend(inner);
                }
                Ok(shape)
            }
        }
    }

    /// Row-major elements together with the shape.
    pub fn flatten(&self) -> Result<(Vec<f32>, Vec<usize>), Error> {
        let shape = self.shape()?;
        let mut data = Vec::with_capacity(shape.iter().product());
        self.push_elements(&mut data);
        Ok((data, shape))
    }

    fn push_elements(&self, out: &mut Vec<f32>) {
        match self {
            NestedList::Scalar(v) => out.push(*v),
            NestedList::List(items) => items.iter().for_each(|i| i.push_elements(out)),
        }
    }

    /// Rebuilds the nesting from row-major `data`. `data.len()` must equal the shape's product.
    pub(crate) fn from_flat(data: &[f32], shape: &[usize]) -> Self {
        match shape.split_first() {
            None => NestedList::Scalar(data.first().copied().unwrap_or_default()),
            Some((&n, rest)) => {
                let chunk: usize = rest.iter().product();
                NestedList::List(
                    (0..n)
                        .map(|i| NestedList::from_flat(&data[i * chunk..(i + 1) * chunk], rest))
                        .collect(),
                )
            }
        }
    }

    pub fn as_scalar(&self) -> Option<f32> {
        match self {
            NestedList::Scalar(v) => Some(*v),
            NestedList::List(_) => None,
        }
    }
}

impl From<f32> for NestedList {
    fn from(value: f32) -> Self {
        NestedList::Scalar(value)
    }
}

impl<T: Into<NestedList>> From<Vec<T>> for NestedList {
    fn from(items: Vec<T>) -> Self {
        NestedList::List(items.into_iter().map(Into::into).collect())
    }
}
