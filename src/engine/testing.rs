//! Link fakes for engine tests.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::ble::link::{ChannelId, LinkAdapter};
use crate::error::LinkError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LinkCall {
    Write { channel: ChannelId, data: Vec<u8> },
    Subscribe { channel: ChannelId },
}

/// Records every call and always succeeds.
#[derive(Debug, Default)]
pub(crate) struct RecordingLink {
    calls: Mutex<Vec<LinkCall>>,
}

impl RecordingLink {
    pub(crate) fn calls(&self) -> Vec<LinkCall> {
        self.calls.lock().clone()
    }

    pub(crate) fn writes_to(&self, target: Uuid) -> Vec<Vec<u8>> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                LinkCall::Write { channel, data } if *channel == target => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn clear(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl LinkAdapter for RecordingLink {
    async fn write_characteristic(&self, channel: ChannelId, data: &[u8]) -> Result<(), LinkError> {
        self.calls.lock().push(LinkCall::Write {
            channel,
            data: data.to_vec(),
        });
        // Give other tasks a chance to interleave.
        tokio::task::yield_now().await;
        Ok(())
    }

    async fn subscribe_notifications(&self, channel: ChannelId) -> Result<(), LinkError> {
        self.calls.lock().push(LinkCall::Subscribe { channel });
        tokio::task::yield_now().await;
        Ok(())
    }
}

/// Never answers within a reasonable time.
#[derive(Debug)]
pub(crate) struct SlowLink {
    delay: Duration,
}

impl SlowLink {
    pub(crate) fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl LinkAdapter for SlowLink {
    async fn write_characteristic(&self, _channel: ChannelId, _data: &[u8]) -> Result<(), LinkError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    async fn subscribe_notifications(&self, _channel: ChannelId) -> Result<(), LinkError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}
