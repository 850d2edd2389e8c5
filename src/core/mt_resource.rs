use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};

/// A thread-safe, reference-counted handle with read-write locking.
///
/// `MtResource` is the coarse lock of the engine: the whole `World` lives behind one,
/// and so does the `BlockEnvironment`. Generation, level loading and level saving each
/// hold the world lock for their entire duration; there is no finer-grained locking
/// below it.
///
/// # Type Parameters
/// - `T`: The type of the contained resource, must be `Send + Sync`
///
/// # Examples
///
/// ```
/// use block_world::core::MtResource;
///
/// let counter = MtResource::new(0);
/// *counter.get_mut() += 1;
/// assert_eq!(*counter.get(), 1);
///
/// // A busy lock is reported instead of waited for.
/// let guard = counter.get_mut();
/// assert!(counter.try_get().is_none());
/// drop(guard);
/// assert!(counter.try_get().is_some());
/// ```
///
/// # Poisoning
/// A panic while a guard is held does not make the resource unusable: the guard
/// accessors recover the inner value. Every mutation of the world keeps its
/// invariants between individual block operations, so a partially applied operation
/// still leaves a consistent world.
pub struct MtResource<T: Send + Sync> {
    pub resource: Arc<RwLock<T>>,
}

impl<T: Send + Sync + 'static> MtResource<T> {
    /// Creates a new `MtResource` containing the given value.
    pub fn new(resource: T) -> Self {
        Self {
            resource: Arc::new(RwLock::new(resource)),
        }
    }

    /// Returns a read guard, blocking until no writer holds the lock.
    pub fn get(&self) -> RwLockReadGuard<'_, T> {
        self.resource.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a write guard, blocking until the lock is free.
    pub fn get_mut(&self) -> RwLockWriteGuard<'_, T> {
        self.resource.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a read guard if the lock can be taken right now.
    ///
    /// # Returns
    /// `None` when a writer currently holds the lock (for example a generation run)
    pub fn try_get(&self) -> Option<RwLockReadGuard<'_, T>> {
        match self.resource.try_read() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// Returns a write guard if the lock can be taken right now.
    pub fn try_get_mut(&self) -> Option<RwLockWriteGuard<'_, T>> {
        match self.resource.try_write() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }
}

impl<T: Send + Sync> Clone for MtResource<T> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
        }
    }
}
