//! Page blocking: exclusive access to shared-resource pages
//!
//! Some pages stand for a resource only one member of a group may hold at a
//! time. A guarded page names the data key holding the group ("correlation
//! key") and the other pages it is blocked together with. Entering is denied
//! while another scene of the same type, with the same correlation value,
//! sits on any of those pages.
//!
//! The check reads live registry state and takes no lock. Two scenes racing
//! for the same page can both pass before either commits. That window is
//! acceptable at human chat pace; do not reuse this for high-throughput
//! coordination.

use serde_json::Value;
use tracing::debug;

use crate::manager::SceneManager;
use crate::scene::Scene;

pub const DEFAULT_DENIAL_TEXT: &str = "⛔ This page is already in use by a member of your group";

/// Location of the correlation value inside a scene's data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationKey {
    pub page: String,
    pub key: String,
}

impl CorrelationKey {
    pub fn new(page: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            page: page.into(),
            key: key.into(),
        }
    }
}

/// Exclusive access rule of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageGuard {
    pub correlation: CorrelationKey,
    /// Pages that count as occupied together with the guarded one.
    pub blocked_with: Vec<String>,
    pub denial: String,
}

impl PageGuard {
    pub fn new(correlation: CorrelationKey) -> Self {
        Self {
            correlation,
            blocked_with: Vec::new(),
            denial: DEFAULT_DENIAL_TEXT.to_string(),
        }
    }

    pub fn blocked_with<I, S>(mut self, pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blocked_with = pages.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_denial(mut self, denial: impl Into<String>) -> Self {
        self.denial = denial.into();
        self
    }
}

/// Result of an access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Granted,
    Denied { holder: scene_core::UserId, page: String },
}

impl Access {
    pub fn is_granted(&self) -> bool {
        matches!(self, Access::Granted)
    }
}

/// Check whether `scene` may enter `target` under `guard`.
///
/// Scenes without a correlation value belong to no group and are always let in.
pub async fn check_access(
    manager: &SceneManager,
    scene: &Scene,
    target: &str,
    guard: &PageGuard,
) -> Access {
    let CorrelationKey { page, key } = &guard.correlation;
    let group = match scene.get_key(page, key).await {
        Some(Value::Null) | None => return Access::Granted,
        Some(group) => group,
    };

    let pages = std::iter::once(target).chain(guard.blocked_with.iter().map(String::as_str));
    for blocked in pages {
        let others = manager
            .get_for_params_except(scene.user_id(), scene.scene_type(), blocked)
            .await;
        for other in others {
            if other.get_key(page, key).await.as_ref() == Some(&group) {
                debug!(
                    user_id = scene.user_id(),
                    holder = other.user_id(),
                    page = blocked,
                    "page blocked by group member"
                );
                return Access::Denied {
                    holder: other.user_id(),
                    page: blocked.to_string(),
                };
            }
        }
    }
    Access::Granted
}
