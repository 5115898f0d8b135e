use {
    core::{
        pin::Pin,
        task::{Context, Poll, Waker},
    },
    std::sync::{Arc, Mutex},
};

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
               Queue Channel
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// Batching multi-producer queue.
/// Everything sent since the last receive is handed out as one batch.
struct ChannelState<T> {
    send_buf: Option<Vec<T>>,
    num_senders: usize,
    waker: Option<Waker>,
}

pub struct ChannelSender<T>(Arc<Mutex<ChannelState<T>>>);
pub struct ChannelReceiver<T>(Arc<Mutex<ChannelState<T>>>);

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

impl<T: Send> ChannelSender<T> {
    pub fn send(&self, msg: T) {
        let mut state = self.0.lock().unwrap();
        state.send_buf.get_or_insert_with(Vec::new).push(msg);

        if let Some(waker) = state.waker.take() {
            waker.wake();
        }
    }
}

impl<T> Clone for ChannelSender<T> {
    fn clone(&self) -> Self {
        self.0.lock().unwrap().num_senders += 1;
        ChannelSender(self.0.clone())
    }
}

impl<T> Drop for ChannelSender<T> {
    fn drop(&mut self) {
        let mut state = self.0.lock().unwrap();
        state.num_senders -= 1;
        if let Some(waker) = state.waker.take() {
            waker.wake();
        }
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

impl<T: Send> ChannelReceiver<T> {
    /// Waits for the next batch; `None` once every sender is gone.
    pub async fn recv(&self) -> Option<Vec<T>> {
        ChannelRead(self.0.clone()).await
    }

    pub fn try_recv(&self) -> Option<Vec<T>> {
        self.0.lock().unwrap().send_buf.take()
    }
}

struct ChannelRead<T>(Arc<Mutex<ChannelState<T>>>);

impl<T> std::future::Future for ChannelRead<T> {
    type Output = Option<Vec<T>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        let mut state = self.0.lock().unwrap();
        if let Some(buf) = state.send_buf.take() {
            Poll::Ready(Some(buf))
        } else if state.num_senders == 0 {
            Poll::Ready(None)
        } else {
            state.waker = Some(cx.waker().clone());
            Poll::Pending
        }
    }
}

pub fn queue_channel<T: Send>() -> (ChannelSender<T>, ChannelReceiver<T>) {
    let state = Arc::new(Mutex::new(ChannelState {
        send_buf: None,
        num_senders: 1,
        waker: None,
    }));

    (ChannelSender(state.clone()), ChannelReceiver(state))
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

#[cfg(test)]
mod tests {
    use crate::view::channel::*;

    #[test]
    fn batches_in_send_order() {
        let (tx, rx) = queue_channel::<u32>();
        assert_eq!(rx.try_recv(), None);

        tx.send(1);
        tx.clone().send(2);
        assert_eq!(rx.try_recv(), Some(vec![1, 2]));
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn recv_ends_without_senders() {
        let (tx, rx) = queue_channel::<u32>();
        tx.send(5);
        drop(tx);

        async_std::task::block_on(async {
            assert_eq!(rx.recv().await, Some(vec![5]));
            assert_eq!(rx.recv().await, None);
        });
    }
}
