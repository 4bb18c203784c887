use futures::stream::{LocalBoxStream, StreamExt};
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Interleaves several streams, polling ready inputs in list order.
///
/// Finished inputs are dropped as soon as they report completion so their
/// cancellation registrations are released early.
pub(crate) struct Merge<A> {
    streams: Vec<LocalBoxStream<'static, A>>,
}

impl<A> Merge<A> {
    pub(crate) fn new(streams: Vec<LocalBoxStream<'static, A>>) -> Self {
        Self { streams }
    }
}

impl<A> Stream for Merge<A> {
    type Item = A;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<A>> {
        let streams = &mut self.streams;
        let mut index = 0;
        while index < streams.len() {
            match streams[index].poll_next_unpin(cx) {
                Poll::Ready(Some(item)) => return Poll::Ready(Some(item)),
                Poll::Ready(None) => {
                    streams.remove(index);
                }
                Poll::Pending => index += 1,
            }
        }

        if streams.is_empty() {
            Poll::Ready(None)
        } else {
            Poll::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on_stream;
    use futures::stream;

    #[test]
    fn ready_inputs_are_drained_in_order() {
        let merged = Merge::new(vec![
            stream::iter(vec![1, 2]).boxed_local(),
            stream::iter(vec![3]).boxed_local(),
        ]);

        let items: Vec<_> = block_on_stream(merged).collect();
        assert_eq!(items, vec![1, 2, 3]);
    }

    #[test]
    fn empty_merge_completes() {
        let merged = Merge::<u8>::new(Vec::new());
        assert_eq!(block_on_stream(merged).count(), 0);
    }
}
