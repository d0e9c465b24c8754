use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::common::{ArborError, PageId, Result, PAGE_SIZE};

use super::DiskManager;

/// A queued disk I/O request.
///
/// Requests carry raw pointers into the caller's buffer; the caller blocks
/// on the completion channel, which keeps the buffer valid until the
/// worker has finished with it.
enum DiskRequest {
    Read {
        page_id: PageId,
        data: *mut u8,
        done: Sender<bool>,
    },
    Write {
        page_id: PageId,
        data: *const u8,
        done: Sender<bool>,
    },
}

// Safety: the pointers are only dereferenced by the worker thread while
// the requesting thread is parked on the completion channel.
unsafe impl Send for DiskRequest {}

/// DiskScheduler funnels page I/O through a single background worker
/// thread fed by a bounded request channel.
pub struct DiskScheduler {
    disk_manager: Arc<DiskManager>,
    request_sender: Sender<DiskRequest>,
    shutdown: Arc<AtomicBool>,
    worker_handle: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    pub fn new(disk_manager: Arc<DiskManager>) -> Self {
        let (sender, receiver) = bounded::<DiskRequest>(128);
        let shutdown = Arc::new(AtomicBool::new(false));

        let dm = Arc::clone(&disk_manager);
        let stop = Arc::clone(&shutdown);
        let worker_handle = thread::spawn(move || Self::run_worker(dm, receiver, stop));

        Self {
            disk_manager,
            request_sender: sender,
            shutdown,
            worker_handle: Some(worker_handle),
        }
    }

    /// Schedules a read and blocks until the worker completes it.
    pub fn schedule_read_sync(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE);

        let (done, completion) = bounded(1);
        self.submit(DiskRequest::Read {
            page_id,
            data: data.as_mut_ptr(),
            done,
        })?;
        self.await_completion(page_id, completion)
    }

    /// Schedules a write and blocks until the worker completes it.
    pub fn schedule_write_sync(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE);

        let (done, completion) = bounded(1);
        self.submit(DiskRequest::Write {
            page_id,
            data: data.as_ptr(),
            done,
        })?;
        self.await_completion(page_id, completion)
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk_manager
    }

    fn submit(&self, request: DiskRequest) -> Result<()> {
        self.request_sender
            .send(request)
            .map_err(|e| ArborError::DiskScheduler(format!("failed to queue request: {}", e)))
    }

    fn await_completion(&self, page_id: PageId, completion: Receiver<bool>) -> Result<()> {
        match completion.recv() {
            Ok(true) => Ok(()),
            Ok(false) => Err(ArborError::DiskScheduler(format!(
                "I/O on {} failed",
                page_id
            ))),
            Err(e) => Err(ArborError::DiskScheduler(format!(
                "worker dropped completion: {}",
                e
            ))),
        }
    }

    fn run_worker(
        disk_manager: Arc<DiskManager>,
        receiver: Receiver<DiskRequest>,
        shutdown: Arc<AtomicBool>,
    ) {
        loop {
            if shutdown.load(Ordering::Relaxed) {
                // Drain what is already queued before exiting.
                while let Ok(request) = receiver.try_recv() {
                    Self::process(&disk_manager, request);
                }
                break;
            }

            match receiver.recv_timeout(Duration::from_millis(100)) {
                Ok(request) => Self::process(&disk_manager, request),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn process(disk_manager: &DiskManager, request: DiskRequest) {
        match request {
            DiskRequest::Read {
                page_id,
                data,
                done,
            } => {
                // Safety: the requester keeps the buffer alive until `done` fires.
                let buf = unsafe { std::slice::from_raw_parts_mut(data, PAGE_SIZE) };
                let _ = done.send(disk_manager.read_page(page_id, buf).is_ok());
            }
            DiskRequest::Write {
                page_id,
                data,
                done,
            } => {
                // Safety: as above.
                let buf = unsafe { std::slice::from_raw_parts(data, PAGE_SIZE) };
                let _ = done.send(disk_manager.write_page(page_id, buf).is_ok());
            }
        }
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_disk_scheduler_read_write() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let scheduler = DiskScheduler::new(dm);

        let page_id = scheduler.disk_manager().allocate_page().unwrap();

        let mut write_data = [0u8; PAGE_SIZE];
        write_data[0] = 42;
        write_data[100] = 255;
        scheduler.schedule_write_sync(page_id, &write_data).unwrap();

        let mut read_data = [0u8; PAGE_SIZE];
        scheduler
            .schedule_read_sync(page_id, &mut read_data)
            .unwrap();

        assert_eq!(read_data[0], 42);
        assert_eq!(read_data[100], 255);
    }

    #[test]
    fn test_disk_scheduler_sequential_requests() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let scheduler = DiskScheduler::new(dm);

        let page_id1 = scheduler.disk_manager().allocate_page().unwrap();
        let page_id2 = scheduler.disk_manager().allocate_page().unwrap();

        scheduler
            .schedule_write_sync(page_id1, &[1u8; PAGE_SIZE])
            .unwrap();
        scheduler
            .schedule_write_sync(page_id2, &[2u8; PAGE_SIZE])
            .unwrap();

        let mut read1 = [0u8; PAGE_SIZE];
        let mut read2 = [0u8; PAGE_SIZE];
        scheduler.schedule_read_sync(page_id1, &mut read1).unwrap();
        scheduler.schedule_read_sync(page_id2, &mut read2).unwrap();

        assert_eq!(read1[0], 1);
        assert_eq!(read2[0], 2);
    }
}
