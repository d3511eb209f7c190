//! Command-level tests with in-memory Telegram fakes

mod test_add;
mod test_post;
mod test_scrape;

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use telety::{Batch, BatchCursor, BatchSource, Pacer, ProviderError, UnitWorker};

/// Records pauses instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingPacer {
    pub pauses: Vec<Duration>,
}

impl Pacer for RecordingPacer {
    fn pause(&mut self, duration: Duration) -> impl Future<Output = ()> + Send {
        self.pauses.push(duration);
        std::future::ready(())
    }
}

/// Member list split into pages, with optional scripted failures first.
pub struct FakeMembers {
    pub members: Vec<Option<String>>,
    pub failures: VecDeque<ProviderError>,
    pub page_size: usize,
    pub offsets: Vec<usize>,
}

impl FakeMembers {
    pub fn new(members: Vec<Option<String>>, page_size: usize) -> Self {
        Self {
            members,
            failures: VecDeque::new(),
            page_size,
            offsets: Vec::new(),
        }
    }
}

impl BatchSource<String> for FakeMembers {
    fn fetch(
        &mut self,
        cursor: BatchCursor,
    ) -> impl Future<Output = Result<Batch<String>, ProviderError>> + Send {
        self.offsets.push(cursor.offset());
        let result = match self.failures.pop_front() {
            Some(err) => Err(err),
            None => {
                let start = cursor.offset().min(self.members.len());
                let end = (start + self.page_size).min(self.members.len());
                let page = &self.members[start..end];
                Ok(Batch::new(page.len(), page.iter().flatten().cloned().collect()))
            }
        };
        std::future::ready(result)
    }
}

/// Accepts every unit except the ones listed in `refuse`.
#[derive(Default)]
pub struct FakeWorker {
    pub refuse: Vec<String>,
    pub done: Vec<String>,
}

impl<U: ToString> UnitWorker<U> for FakeWorker {
    fn process(&mut self, unit: &U) -> impl Future<Output = Result<(), ProviderError>> + Send {
        let name = unit.to_string();
        let result = if self.refuse.contains(&name) {
            Err(ProviderError::Transient(format!("{name} refused")))
        } else {
            self.done.push(name);
            Ok(())
        };
        std::future::ready(result)
    }
}
