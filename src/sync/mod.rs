/*!
 * Synchronization Primitives
 * Counting semaphores, locks, and condition variables over the scheduler
 *
 * All three primitives block through the scheduler, not the host OS: a
 * waiting thread is Blocked in the thread registry and owned by exactly one
 * wait set until released.
 */

mod condition;
mod lock;
mod semaphore;

pub use condition::Condition;
pub use lock::Lock;
pub use semaphore::Semaphore;
