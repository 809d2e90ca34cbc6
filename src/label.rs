//! Label allocation for branch targets and variable storage.

use std::fmt;

/// Symbolic address used as a branch target or storage location marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
  /// Issued by a [`LabelAllocator`]; unique within one translation.
  Generated(u32),
  /// Storage word of a declared variable, named after the variable itself.
  Variable(String),
}

impl fmt::Display for Label {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Label::Generated(n) => write!(f, "A{n:03}"),
      Label::Variable(name) => f.write_str(name),
    }
  }
}

/// Hands out fresh labels from a monotonically increasing counter.
///
/// Labels are never reused. The only way the counter moves backwards is
/// [`LabelAllocator::restore`], which ordered-choice backtracking uses to
/// forget labels allocated by an alternative that did not match. The counter
/// is wider than a label number so that handing out `u32::MAX` itself does
/// not overflow; only the label after it is refused.
#[derive(Debug, Clone)]
pub struct LabelAllocator {
  next: u64,
}

impl Default for LabelAllocator {
  fn default() -> Self {
    Self::starting_at(1)
  }
}

impl LabelAllocator {
  pub fn starting_at(first: u32) -> Self {
    Self {
      next: u64::from(first),
    }
  }

  /// A fresh label, or `None` once every label number has been used.
  pub fn allocate(&mut self) -> Option<Label> {
    let label = Label::Generated(u32::try_from(self.next).ok()?);
    self.next += 1;
    log::trace!("allocated label {label}");
    Some(label)
  }

  /// The value the next call to [`LabelAllocator::allocate`] would use.
  pub fn checkpoint(&self) -> u64 {
    self.next
  }

  pub fn restore(&mut self, checkpoint: u64) {
    debug_assert!(checkpoint <= self.next);
    self.next = checkpoint;
  }
}
