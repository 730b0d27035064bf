use std::fmt;

use smallvec::SmallVec;

use crate::error::ArrayError;
use crate::value::{Value, ValueType};

/// Packed per-slot known/unknown bitmap, parallel to an array's element
/// vector. Growing preserves existing bits; new slots come back unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct KnownBits {
    words: SmallVec<[u64; 1]>,
    len: usize,
}

impl KnownBits {
    fn with_len(len: usize) -> Self {
        let mut bits = Self::default();
        bits.resize(len);
        bits
    }

    fn word_count(len: usize) -> usize {
        (len + 63) / 64
    }

    fn resize(&mut self, len: usize) {
        self.words.resize(Self::word_count(len), 0);
        if len < self.len {
            // Clear any bits beyond the new length that live in the last
            // retained word, so a later grow doesn't resurrect stale bits.
            if let Some(last) = self.words.last_mut() {
                let used_bits = len % 64;
                if used_bits != 0 {
                    *last &= (1u64 << used_bits) - 1;
                }
            }
        }
        self.len = len;
    }

    fn get(&self, idx: usize) -> bool {
        debug_assert!(idx < self.len);
        let word = self.words[idx / 64];
        (word >> (idx % 64)) & 1 == 1
    }

    fn set(&mut self, idx: usize, known: bool) {
        debug_assert!(idx < self.len);
        let word = &mut self.words[idx / 64];
        if known {
            *word |= 1 << (idx % 64);
        } else {
            *word &= !(1 << (idx % 64));
        }
    }

    fn all_known(&self) -> bool {
        (0..self.len).all(|i| self.get(i))
    }

    fn any_known(&self) -> bool {
        (0..self.len).any(|i| self.get(i))
    }
}

/// A homogeneous, fixed-element-type array with a per-slot known flag.
///
/// `resize` preserves existing value bits when growing; new slots are
/// marked unknown. Equality compares size and, slot by slot, the known
/// flag together with the value where both sides are known.
#[derive(Debug, Clone, Default)]
pub struct Array<T> {
    elements: SmallVec<[T; 4]>,
    known: KnownBits,
}

impl<T: Clone + Default + PartialEq> Array<T> {
    pub fn new() -> Self {
        Self { elements: SmallVec::new(), known: KnownBits::default() }
    }

    pub fn with_size(n: usize) -> Self {
        let mut a = Self::new();
        a.resize(n);
        a
    }

    pub fn from_known_values(values: impl IntoIterator<Item = T>) -> Self {
        let elements: SmallVec<[T; 4]> = values.into_iter().collect();
        let known = {
            let mut k = KnownBits::with_len(elements.len());
            for i in 0..elements.len() {
                k.set(i, true);
            }
            k
        };
        Self { elements, known }
    }

    pub fn size(&self) -> usize {
        self.elements.len()
    }

    /// Grow or shrink to `n` elements. Growing preserves existing values
    /// and their known flags; new slots are unknown. Shrinking never
    /// reallocates below the backing storage's capacity.
    pub fn resize(&mut self, n: usize) {
        self.elements.resize(n, T::default());
        self.known.resize(n);
    }

    pub fn get(&self, idx: usize) -> Result<(T, bool), ArrayError> {
        self.check_index(idx)?;
        Ok((self.elements[idx].clone(), self.known.get(idx)))
    }

    pub fn get_ref(&self, idx: usize) -> Result<(&T, bool), ArrayError> {
        self.check_index(idx)?;
        Ok((&self.elements[idx], self.known.get(idx)))
    }

    pub fn set(&mut self, idx: usize, value: T) -> Result<(), ArrayError> {
        self.check_index(idx)?;
        self.elements[idx] = value;
        self.known.set(idx, true);
        Ok(())
    }

    pub fn set_unknown(&mut self, idx: usize) -> Result<(), ArrayError> {
        self.check_index(idx)?;
        self.elements[idx] = T::default();
        self.known.set(idx, false);
        Ok(())
    }

    pub fn element_known(&self, idx: usize) -> Result<bool, ArrayError> {
        self.check_index(idx)?;
        Ok(self.known.get(idx))
    }

    pub fn all_known(&self) -> bool {
        self.known.all_known()
    }

    pub fn any_known(&self) -> bool {
        self.known.any_known()
    }

    fn check_index(&self, idx: usize) -> Result<(), ArrayError> {
        if idx >= self.elements.len() {
            Err(ArrayError::IndexOutOfRange { index: idx, size: self.elements.len() })
        } else {
            Ok(())
        }
    }
}

impl<T: Clone + Default + PartialEq> PartialEq for Array<T> {
    fn eq(&self, other: &Self) -> bool {
        if self.elements.len() != other.elements.len() {
            return false;
        }
        (0..self.elements.len()).all(|i| {
            let k = self.known.get(i);
            k == other.known.get(i) && (!k || self.elements[i] == other.elements[i])
        })
    }
}

/// Type-erased access to an [`Array`] of any element type, used by
/// operators (`SIZE`, `ALL_KNOWN`, `ANY_KNOWN`) and array variables that
/// need to manipulate elements generically.
pub trait AnyArray: fmt::Debug {
    fn size(&self) -> usize;
    fn resize(&mut self, n: usize);
    fn element_known(&self, idx: usize) -> Result<bool, ArrayError>;
    fn element_value(&self, idx: usize) -> Result<Value, ArrayError>;
    fn set_element_value(&mut self, idx: usize, value: &Value) -> Result<(), ArrayError>;
    fn set_element_unknown(&mut self, idx: usize) -> Result<(), ArrayError>;
    fn all_known(&self) -> bool;
    fn any_known(&self) -> bool;
    fn element_type(&self) -> ValueType;
    fn to_value(&self) -> Value;
    fn equals_any(&self, other: &dyn AnyArray) -> bool;
    fn clone_boxed(&self) -> Box<dyn AnyArray>;
}

macro_rules! any_array_impl {
    ($elem:ty, $value_ctor:ident, $value_type:ident, $array_value_ctor:ident) => {
        impl AnyArray for Array<$elem> {
            fn size(&self) -> usize {
                Array::size(self)
            }

            fn resize(&mut self, n: usize) {
                Array::resize(self, n)
            }

            fn element_known(&self, idx: usize) -> Result<bool, ArrayError> {
                Array::element_known(self, idx)
            }

            fn element_value(&self, idx: usize) -> Result<Value, ArrayError> {
                let (v, known) = Array::get(self, idx)?;
                Ok(if known { Value::$value_ctor(v) } else { Value::Unknown })
            }

            fn set_element_value(
                &mut self,
                idx: usize,
                value: &Value,
            ) -> Result<(), ArrayError> {
                match value {
                    Value::Unknown => Array::set_unknown(self, idx),
                    Value::$value_ctor(v) => Array::set(self, idx, v.clone()),
                    other => Err(ArrayError::ElementTypeMismatch {
                        expected: ValueType::$value_type,
                        found: other.value_type(),
                    }),
                }
            }

            fn set_element_unknown(&mut self, idx: usize) -> Result<(), ArrayError> {
                Array::set_unknown(self, idx)
            }

            fn all_known(&self) -> bool {
                Array::all_known(self)
            }

            fn any_known(&self) -> bool {
                Array::any_known(self)
            }

            fn element_type(&self) -> ValueType {
                ValueType::$value_type
            }

            fn to_value(&self) -> Value {
                Value::$array_value_ctor(self.clone())
            }

            fn equals_any(&self, other: &dyn AnyArray) -> bool {
                if other.element_type() != ValueType::$value_type {
                    return false;
                }
                if self.size() != other.size() {
                    return false;
                }
                (0..self.size()).all(|i| {
                    let ours = self.element_value(i).expect("index checked by size");
                    let theirs = other.element_value(i).expect("index checked by size");
                    ours == theirs
                })
            }

            fn clone_boxed(&self) -> Box<dyn AnyArray> {
                Box::new(self.clone())
            }
        }
    };
}

any_array_impl!(bool, Boolean, Boolean, BooleanArray);
any_array_impl!(i64, Integer, Integer, IntegerArray);
any_array_impl!(f64, Real, Real, RealArray);
any_array_impl!(arcstr::ArcStr, String, String, StringArray);
