//! Scoped rollback over an external storage session

use std::ops::{Deref, DerefMut};

use crate::normalize::{DomainError, HandlerFailure};

/// The storage session a handler writes through
///
/// Implemented by the host's ORM/session type. The gate only decides when to
/// commit or roll back; how is up to the implementation.
pub trait StorageSession {
    fn commit(&mut self) -> Result<(), DomainError>;

    fn rollback(&mut self);
}

/// Guard over one unit of work
///
/// Dropping the scope without a successful [`TransactionScope::commit`]
/// rolls the session back exactly once. That covers early returns, `?`,
/// panics and cancelled futures alike.
pub struct TransactionScope<'s, S: StorageSession + ?Sized> {
    session: &'s mut S,
    finished: bool,
}

impl<'s, S: StorageSession + ?Sized> TransactionScope<'s, S> {
    pub fn begin(session: &'s mut S) -> Self {
        Self {
            session,
            finished: false,
        }
    }

    /// Commit the unit of work; a failed commit is rolled back
    pub fn commit(mut self) -> Result<(), DomainError> {
        self.session.commit()?;
        self.finished = true;
        Ok(())
    }
}

impl<S: StorageSession + ?Sized> Deref for TransactionScope<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.session
    }
}

impl<S: StorageSession + ?Sized> DerefMut for TransactionScope<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.session
    }
}

impl<S: StorageSession + ?Sized> Drop for TransactionScope<'_, S> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!("rolling back uncommitted transaction");
            self.session.rollback();
        }
    }
}

/// Run `work` in a transaction: commit on success, roll back and classify on
/// failure
pub fn run_in_transaction<S, T, F>(session: &mut S, work: F) -> Result<T, HandlerFailure>
where
    S: StorageSession + ?Sized,
    F: FnOnce(&mut S) -> Result<T, DomainError>,
{
    let mut scope = TransactionScope::begin(session);
    let value = work(&mut *scope)?;
    scope.commit()?;
    Ok(value)
}
