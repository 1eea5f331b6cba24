use std::os::fd::RawFd;
use std::{fmt, io};

use crate::event::TimerId;

/// Errors returned by event loop operations.
///
/// `iterate` and `run` never fail as a whole; only registration, resize and
/// timer deletion report errors.
#[derive(Debug)]
pub enum Error {
  /// The descriptor does not fit the file table.
  OutOfRange { fd: RawFd, capacity: usize },
  /// A resize was requested below the largest registered descriptor.
  Busy { max_fd: RawFd, requested: usize },
  /// Timer deletion referenced an id that is not pending.
  NotFound(TimerId),
  /// The kernel readiness primitive rejected an operation.
  Backend(io::Error),
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::OutOfRange { fd, capacity } => {
        write!(f, "fd {fd} is outside the file table (capacity {capacity})")
      }
      Self::Busy { max_fd, requested } => write!(
        f,
        "cannot resize to {requested} while fd {max_fd} is registered"
      ),
      Self::NotFound(id) => write!(f, "no pending timer with id {id}"),
      Self::Backend(err) => write!(f, "backend failure: {err}"),
    }
  }
}

impl std::error::Error for Error {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      Self::Backend(err) => Some(err),
      _ => None,
    }
  }
}

impl From<io::Error> for Error {
  fn from(err: io::Error) -> Self {
    Self::Backend(err)
  }
}
