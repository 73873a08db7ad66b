//! In-memory [`InstanceApi`] for tests.
//!
//! Tracks call counts, simulates operation latency and injected failures,
//! and flips the reported status when start/stop succeed.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::api::{ApiFuture, InstanceApi};
use crate::error::ComputeError;
use crate::types::{InstanceRef, InstanceStatus};

pub struct MockInstanceApi {
    instance: InstanceRef,
    status: Mutex<InstanceStatus>,
    status_calls: AtomicUsize,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    start_delay: Mutex<Duration>,
    stop_delay: Mutex<Duration>,
    fail_status: AtomicBool,
    fail_start: AtomicBool,
    fail_stop: AtomicBool,
}

impl MockInstanceApi {
    pub fn new(status: InstanceStatus) -> Self {
        Self {
            instance: InstanceRef::new("test-project", "test-zone", "test-instance"),
            status: Mutex::new(status),
            status_calls: AtomicUsize::new(0),
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            start_delay: Mutex::new(Duration::ZERO),
            stop_delay: Mutex::new(Duration::ZERO),
            fail_status: AtomicBool::new(false),
            fail_start: AtomicBool::new(false),
            fail_stop: AtomicBool::new(false),
        }
    }

    pub fn stopped() -> Self {
        Self::new(InstanceStatus::Stopped)
    }

    pub fn running() -> Self {
        Self::new(InstanceStatus::Running)
    }

    pub fn set_status(&self, status: InstanceStatus) {
        *self.status.lock().expect("mock status lock") = status;
    }

    pub fn current_status(&self) -> InstanceStatus {
        *self.status.lock().expect("mock status lock")
    }

    pub fn set_start_delay(&self, delay: Duration) {
        *self.start_delay.lock().expect("mock delay lock") = delay;
    }

    pub fn set_stop_delay(&self, delay: Duration) {
        *self.stop_delay.lock().expect("mock delay lock") = delay;
    }

    pub fn fail_status(&self, fail: bool) {
        self.fail_status.store(fail, Ordering::SeqCst);
    }

    pub fn fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub fn fail_stop(&self, fail: bool) {
        self.fail_stop.store(fail, Ordering::SeqCst);
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

impl InstanceApi for MockInstanceApi {
    fn instance(&self) -> &InstanceRef {
        &self.instance
    }

    fn status(&self) -> ApiFuture<'_, InstanceStatus> {
        Box::pin(async move {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_status.load(Ordering::SeqCst) {
                return Err(ComputeError::Http("injected status failure".to_string()));
            }
            Ok(self.current_status())
        })
    }

    fn start(&self) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            self.set_status(InstanceStatus::Starting);
            let delay = *self.start_delay.lock().expect("mock delay lock");
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if self.fail_start.load(Ordering::SeqCst) {
                self.set_status(InstanceStatus::Stopped);
                return Err(ComputeError::Operation {
                    name: "operation-start".to_string(),
                    message: "injected start failure".to_string(),
                });
            }
            self.set_status(InstanceStatus::Running);
            Ok(())
        })
    }

    fn stop(&self) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            self.stop_calls.fetch_add(1, Ordering::SeqCst);
            self.set_status(InstanceStatus::Stopping);
            let delay = *self.stop_delay.lock().expect("mock delay lock");
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if self.fail_stop.load(Ordering::SeqCst) {
                self.set_status(InstanceStatus::Running);
                return Err(ComputeError::Operation {
                    name: "operation-stop".to_string(),
                    message: "injected stop failure".to_string(),
                });
            }
            self.set_status(InstanceStatus::Stopped);
            Ok(())
        })
    }
}
