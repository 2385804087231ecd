use std::sync::Mutex;

use domain::Timestamp;

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        time::OffsetDateTime::now_utc()
    }
}

/// 每次调用前进固定步长的时钟，测试中用来得到严格递增的时间戳。
#[derive(Debug)]
pub struct SteppingClock {
    current: Mutex<Timestamp>,
    step: time::Duration,
}

impl SteppingClock {
    pub fn new(start: Timestamp, step: time::Duration) -> Self {
        Self {
            current: Mutex::new(start),
            step,
        }
    }
}

impl Default for SteppingClock {
    fn default() -> Self {
        Self::new(time::OffsetDateTime::UNIX_EPOCH, time::Duration::milliseconds(1))
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> Timestamp {
        let mut current = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = *current;
        *current = now + self.step;
        now
    }
}
