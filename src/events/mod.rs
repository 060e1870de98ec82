//! Channel events: the boundary to the streaming provider.
//!
//! An [`EventClient`] connects to the provider and forwards every
//! subscribe, gifted-subscription and follow event as a [`ChannelEvent`]
//! over a channel. The [`EventRelay`] turns each event into a counter
//! update plus a fireworks request immediately followed by a scroll text.
//!
//! ```text
//!  provider ──▶ EventClient ──ChannelEvent──▶ EventRelay ──┬─▶ Counters
//!                                                          └─▶ AnimationQueue
//!                                                              (Fireworks, Scroll)
//! ```

mod token;
mod twitch;

pub use token::{TokenRecord, TokenStore};
pub use twitch::{parse_frame, EventSubFrame, TwitchClient, TwitchCredentials};

use crate::actor::{AnimationQueue, AnimationRequest};
use crate::animation::TextSegment;
use crate::config::{RuntimeConfig, SharedConfig};
use crate::error::Result;
use crate::state::Counters;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::info;

/// Display name used for anonymous gifters.
pub const ANONYMOUS: &str = "Anonymous";

bitflags::bitflags! {
    /// Set of event kinds a client registers handlers for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventKinds: u8 {
        /// New subscriptions.
        const SUBSCRIBE = 1;
        /// Gifted subscriptions.
        const SUBSCRIPTION_GIFT = 1 << 1;
        /// New followers.
        const FOLLOW = 1 << 2;
    }
}

/// A channel event, reduced to what the display needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Someone subscribed.
    Subscribe {
        /// Subscriber display name.
        user_name: String,
    },
    /// Someone gifted subscriptions. `user_name` is `None` for anonymous gifts.
    SubscriptionGift {
        /// Gifter display name.
        user_name: Option<String>,
        /// Number of subscriptions gifted.
        total: u64,
    },
    /// Someone followed.
    Follow {
        /// Follower display name.
        user_name: String,
    },
}

impl ChannelEvent {
    /// Which kind of event this is.
    pub const fn kind(&self) -> EventKinds {
        match self {
            Self::Subscribe { .. } => EventKinds::SUBSCRIBE,
            Self::SubscriptionGift { .. } => EventKinds::SUBSCRIPTION_GIFT,
            Self::Follow { .. } => EventKinds::FOLLOW,
        }
    }

    /// Name of the user behind the event.
    pub fn user_name(&self) -> &str {
        match self {
            Self::Subscribe { user_name } | Self::Follow { user_name } => user_name,
            Self::SubscriptionGift { user_name, .. } => user_name.as_deref().unwrap_or(ANONYMOUS),
        }
    }

    /// Scroll text announcing this event.
    ///
    /// Gift counts get their own segment in the number color.
    pub fn scroll_text(&self, config: &RuntimeConfig) -> Vec<TextSegment> {
        let name = self.user_name();
        match self {
            Self::Subscribe { .. } => vec![TextSegment::new(
                format!("{name} just subscribed!"),
                config.scroll_color,
            )],
            Self::SubscriptionGift { total, .. } => vec![
                TextSegment::new(format!("{name} just gifted "), config.scroll_color),
                TextSegment::new(total.to_string(), config.scroll_num_color),
                TextSegment::new(" subs!", config.scroll_color),
            ],
            Self::Follow { .. } => vec![TextSegment::new(
                format!("{name} just followed!"),
                config.scroll_color,
            )],
        }
    }
}

/// A provider client that delivers channel events.
///
/// `start` must authenticate, resolve the channel and register handlers for
/// every kind in `kinds` before returning; events then arrive on `events`
/// until `stop` is called or the client fails.
#[async_trait]
pub trait EventClient: Send {
    /// Connect and register handlers.
    async fn start(
        &mut self,
        kinds: EventKinds,
        events: mpsc::UnboundedSender<ChannelEvent>,
    ) -> Result<()>;

    /// Tear the connection down.
    async fn stop(&mut self) -> Result<()>;
}

/// Applies channel events to the shared state.
#[derive(Debug, Clone)]
pub struct EventRelay {
    queue: AnimationQueue,
    counters: Counters,
    config: SharedConfig,
}

impl EventRelay {
    /// Create a relay over the shared queue, counters and config.
    pub const fn new(queue: AnimationQueue, counters: Counters, config: SharedConfig) -> Self {
        Self {
            queue,
            counters,
            config,
        }
    }

    /// Update counters, then enqueue fireworks followed by the scroll text.
    pub fn handle(&self, event: &ChannelEvent) {
        match event {
            ChannelEvent::Subscribe { .. } => {
                let total = self.counters.add_subscribers(1);
                info!(user = event.user_name(), subscribers = total, "new subscriber");
            }
            ChannelEvent::SubscriptionGift { total: gifted, .. } => {
                let total = self.counters.add_subscribers(*gifted);
                info!(user = event.user_name(), gifted, subscribers = total, "subscriptions gifted");
            }
            ChannelEvent::Follow { .. } => {
                let total = self.counters.add_follower();
                info!(user = event.user_name(), followers = total, "new follower");
            }
        }

        let config = self.config.snapshot();
        self.queue.enqueue_all([
            AnimationRequest::Fireworks(config.firework_duration()),
            AnimationRequest::Scroll(event.scroll_text(&config)),
        ]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Rgb;
    use std::time::Duration;

    fn relay() -> (EventRelay, AnimationQueue, Counters) {
        let queue = AnimationQueue::new();
        let counters = Counters::new();
        let relay = EventRelay::new(
            queue.clone(),
            counters.clone(),
            SharedConfig::new(RuntimeConfig::default()),
        );
        (relay, queue, counters)
    }

    fn gift(total: u64) -> ChannelEvent {
        ChannelEvent::SubscriptionGift {
            user_name: Some("gifter".into()),
            total,
        }
    }

    #[test]
    fn test_gifts_accumulate_with_request_pairs() {
        let (relay, queue, counters) = relay();
        for total in [1, 5, 2] {
            relay.handle(&gift(total));
        }
        assert_eq!(counters.subscribers(), 8);

        for total in [1, 5, 2] {
            assert_eq!(
                queue.dequeue(Duration::ZERO),
                Some(AnimationRequest::Fireworks(Duration::from_secs(5)))
            );
            let Some(AnimationRequest::Scroll(segments)) = queue.dequeue(Duration::ZERO) else {
                panic!("expected scroll after fireworks");
            };
            assert_eq!(segments[1].text, total.to_string());
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_gift_text_highlights_count() {
        let config = RuntimeConfig::default();
        let segments = gift(5).scroll_text(&config);
        assert_eq!(
            segments,
            vec![
                TextSegment::new("gifter just gifted ", Rgb::from_u32(0x00FF00)),
                TextSegment::new("5", Rgb::from_u32(0xFF69B4)),
                TextSegment::new(" subs!", Rgb::from_u32(0x00FF00)),
            ]
        );
    }

    #[test]
    fn test_anonymous_gifter() {
        let event = ChannelEvent::SubscriptionGift {
            user_name: None,
            total: 3,
        };
        assert_eq!(event.user_name(), ANONYMOUS);
        let text = event.scroll_text(&RuntimeConfig::default());
        assert_eq!(text[0].text, "Anonymous just gifted ");
    }

    #[test]
    fn test_follow_counts_followers_only() {
        let (relay, queue, counters) = relay();
        relay.handle(&ChannelEvent::Follow {
            user_name: "fan".into(),
        });
        let counts = counters.snapshot();
        assert_eq!((counts.subscribers, counts.followers), (0, 1));
        assert_eq!(queue.len(), 2);
        queue.dequeue(Duration::ZERO);
        assert_eq!(
            queue.dequeue(Duration::ZERO),
            Some(AnimationRequest::Scroll(vec![TextSegment::new(
                "fan just followed!",
                Rgb::from_u32(0x00FF00)
            )]))
        );
    }

    #[test]
    fn test_subscribe_text() {
        let event = ChannelEvent::Subscribe {
            user_name: "viewer".into(),
        };
        assert_eq!(event.kind(), EventKinds::SUBSCRIBE);
        assert_eq!(
            event.scroll_text(&RuntimeConfig::default())[0].text,
            "viewer just subscribed!"
        );
    }

    #[test]
    fn test_duration_follows_config() {
        let (relay, queue, _) = relay();
        let mut updates = serde_json::Map::new();
        updates.insert("FIREWORK_DURATION".into(), serde_json::json!(2.5));
        relay.config.update(&updates);
        relay.handle(&gift(1));
        assert_eq!(
            queue.dequeue(Duration::ZERO),
            Some(AnimationRequest::Fireworks(Duration::from_millis(2500)))
        );
    }
}
