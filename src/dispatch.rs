use {
    crate::view::channel::{queue_channel, ChannelReceiver, ChannelSender},
    serde::{Deserialize, Serialize},
    std::{
        collections::VecDeque,
        sync::Mutex,
        time::{Duration, Instant},
    },
};

pub type Action = Box<dyn FnOnce() + Send>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// How long one `pump` may keep running actions before it yields.
    pub time_budget: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig {
            time_budget: Duration::from_millis(100),
        }
    }
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
              Dispatch Queue
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// Actions pushed from any thread, run in push order on whichever
/// context pumps the queue.
pub struct DispatchQueue {
    config: DispatchConfig,
    sender: ChannelSender<Action>,
    receiver: ChannelReceiver<Action>,
    pending: Mutex<VecDeque<Action>>,
}

impl Default for DispatchQueue {
    fn default() -> Self {
        DispatchQueue::new(DispatchConfig::default())
    }
}

impl DispatchQueue {
    pub fn new(config: DispatchConfig) -> Self {
        let (sender, receiver) = queue_channel();
        DispatchQueue {
            config,
            sender,
            receiver,
            pending: Mutex::new(VecDeque::new()),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn push(&self, action: impl FnOnce() + Send + 'static) {
        self.sender.send(Box::new(action));
    }

    fn collect(&self) -> bool {
        let mut pending = self.pending.lock().unwrap();
        if let Some(batch) = self.receiver.try_recv() {
            pending.extend(batch);
        }
        !pending.is_empty()
    }

    /// Runs queued actions until the queue is drained or the time budget
    /// is used up. Returns whether work remains.
    pub fn pump(&self) -> bool {
        let started = Instant::now();
        let mut ran = 0usize;

        while self.collect() {
            if started.elapsed() >= self.config.time_budget && ran > 0 {
                tracing::debug!(ran, budget = ?self.config.time_budget, "dispatch budget exhausted");
                return true;
            }

            let next = self.pending.lock().unwrap().pop_front();
            if let Some(action) = next {
                action();
                ran += 1;
            }
        }
        false
    }

    /// Waits until something is queued, then runs it, yielding to the
    /// executor between budgets.
    pub async fn run_batch(&self) {
        if !self.collect() {
            match self.receiver.recv().await {
                Some(batch) => self.pending.lock().unwrap().extend(batch),
                None => return,
            }
        }
        self.run_until_idle().await;
    }

    pub async fn run_until_idle(&self) {
        while self.pump() {
            async_std::task::yield_now().await;
        }
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
