//! Intention store.
//!
//! Persists per-domain intention records and the single active intention on
//! top of any [`KeyValueStore`]. Every key is independent: a domain record,
//! the active singleton, the accessible-sites set and the just-set marker can
//! each be written without coordinating with the others.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::domain::normalize_domain;
use crate::error::{GateError, GateResult};
use crate::traits::KeyValueStore;
use crate::types::{
    timed_pass_sentinel, ActiveIntention, IntentionRecord, JustSetMarker, StoredIntention,
};

/// Prefix of per-domain intention keys.
pub const INTENTION_KEY_PREFIX: &str = "intention:";
/// Key of the active intention singleton.
pub const ACTIVE_INTENTION_KEY: &str = "active_intention";
/// Key of the accessible-sites singleton.
pub const ACCESSIBLE_SITES_KEY: &str = "accessible_sites";
/// Key of the just-set marker.
pub const JUST_SET_KEY: &str = "intention_just_set";

/// Key under which the record for `domain` is stored.
pub fn intention_key(domain: &str) -> String {
    format!("{}{}", INTENTION_KEY_PREFIX, normalize_domain(domain))
}

fn chrono_span(duration: std::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(36_500))
}

async fn read_active(kv: &dyn KeyValueStore) -> GateResult<Option<ActiveIntention>> {
    match kv.get(ACTIVE_INTENTION_KEY).await? {
        None => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| GateError::corrupted(ACTIVE_INTENTION_KEY, e)),
    }
}

async fn remove_active(kv: &dyn KeyValueStore) -> GateResult<()> {
    kv.remove(ACTIVE_INTENTION_KEY).await?;
    kv.remove(ACCESSIBLE_SITES_KEY).await
}

/// Persisted intention records plus the active intention singleton.
pub struct IntentionStore {
    kv: Arc<dyn KeyValueStore>,
    config: StoreConfig,
    active_timer: Mutex<Option<JoinHandle<()>>>,
}

impl IntentionStore {
    /// Create a store over a key-value backend.
    pub fn new(kv: Arc<dyn KeyValueStore>, config: StoreConfig) -> Self {
        Self {
            kv,
            config,
            active_timer: Mutex::new(None),
        }
    }

    /// The underlying key-value backend.
    pub fn kv(&self) -> Arc<dyn KeyValueStore> {
        self.kv.clone()
    }

    /// Store timings.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Get the unexpired record for a domain.
    ///
    /// An expired record is deleted on read and reported as absent.
    pub async fn get(&self, domain: &str) -> GateResult<Option<IntentionRecord>> {
        let domain = normalize_domain(domain);
        let key = intention_key(&domain);
        let Some(value) = self.kv.get(&key).await? else {
            return Ok(None);
        };
        let stored: StoredIntention =
            serde_json::from_value(value).map_err(|e| GateError::corrupted(&key, e))?;
        let record = IntentionRecord::from_stored(domain, stored);

        if record.is_expired_at(Utc::now()) {
            debug!(domain = %record.domain, "Evicting expired intention on read");
            self.kv.remove(&key).await?;
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// Save an accepted intention, overwriting any previous record.
    ///
    /// Also writes the just-set marker that suppresses an immediate re-prompt
    /// after the redirect.
    pub async fn save(&self, domain: &str, text: &str) -> GateResult<IntentionRecord> {
        let record = self
            .write_record(domain, text, chrono_span(self.config.record_ttl()))
            .await?;
        self.mark_just_set(&record.domain).await?;
        info!(domain = %record.domain, expires_at = %record.expires_at, "Saved intention");
        Ok(record)
    }

    /// Save a timed pass: the `block:N` sentinel, expiring after `minutes`.
    pub async fn save_timed_pass(&self, domain: &str, minutes: u32) -> GateResult<IntentionRecord> {
        let record = self
            .write_record(
                domain,
                &timed_pass_sentinel(minutes),
                chrono::Duration::minutes(i64::from(minutes)),
            )
            .await?;
        self.mark_just_set(&record.domain).await?;
        info!(domain = %record.domain, minutes, "Saved timed pass");
        Ok(record)
    }

    async fn write_record(
        &self,
        domain: &str,
        text: &str,
        ttl: chrono::Duration,
    ) -> GateResult<IntentionRecord> {
        let now = Utc::now();
        let record = IntentionRecord {
            domain: normalize_domain(domain),
            intention_text: text.to_string(),
            created_at: now,
            expires_at: now + ttl,
        };
        self.kv
            .set(
                &intention_key(&record.domain),
                serde_json::to_value(record.to_stored())?,
            )
            .await?;
        Ok(record)
    }

    /// Delete the record for a domain.
    pub async fn remove(&self, domain: &str) -> GateResult<()> {
        self.kv.remove(&intention_key(domain)).await
    }

    async fn mark_just_set(&self, domain: &str) -> GateResult<()> {
        let marker = JustSetMarker {
            domain: domain.to_string(),
            timestamp: Utc::now(),
        };
        self.kv
            .set(JUST_SET_KEY, serde_json::to_value(&marker)?)
            .await
    }

    /// Whether an intention for `domain` was saved within the just-set window.
    pub async fn is_just_set(&self, domain: &str) -> GateResult<bool> {
        let domain = normalize_domain(domain);
        let Some(value) = self.kv.get(JUST_SET_KEY).await? else {
            return Ok(false);
        };
        let marker: JustSetMarker =
            serde_json::from_value(value).map_err(|e| GateError::corrupted(JUST_SET_KEY, e))?;
        Ok(marker.domain == domain && self.marker_is_fresh(&marker, Utc::now()))
    }

    fn marker_is_fresh(&self, marker: &JustSetMarker, now: DateTime<Utc>) -> bool {
        now - marker.timestamp < chrono_span(self.config.just_set_window())
    }

    /// Every unexpired record.
    pub async fn list(&self) -> GateResult<Vec<IntentionRecord>> {
        let now = Utc::now();
        let mut records: Vec<IntentionRecord> = self
            .kv
            .get_all()
            .await?
            .into_iter()
            .filter_map(|(key, value)| {
                let domain = key.strip_prefix(INTENTION_KEY_PREFIX)?.to_string();
                let stored: StoredIntention = serde_json::from_value(value).ok()?;
                Some(IntentionRecord::from_stored(domain, stored))
            })
            .filter(|r| !r.is_expired_at(now))
            .collect();
        records.sort_by(|a, b| a.domain.cmp(&b.domain));
        Ok(records)
    }

    /// Remove every expired record. Returns the number of records removed.
    ///
    /// Undecodable records are removed as well. An expired active intention
    /// and a stale just-set marker are cleared along the way but not counted.
    pub async fn cleanup_expired(&self) -> GateResult<usize> {
        let now = Utc::now();
        let mut removed = 0;

        for (key, value) in self.kv.get_all().await? {
            if key.starts_with(INTENTION_KEY_PREFIX) {
                let expired = match serde_json::from_value::<StoredIntention>(value) {
                    Ok(stored) => now > stored.expires_at,
                    Err(e) => {
                        warn!(key = %key, error = %e, "Removing undecodable intention record");
                        true
                    }
                };
                if expired {
                    self.kv.remove(&key).await?;
                    removed += 1;
                }
            } else if key == ACTIVE_INTENTION_KEY {
                let expired = serde_json::from_value::<ActiveIntention>(value)
                    .map(|a| a.is_expired_at(now))
                    .unwrap_or(true);
                if expired {
                    remove_active(&*self.kv).await?;
                }
            } else if key == JUST_SET_KEY {
                let stale = serde_json::from_value::<JustSetMarker>(value)
                    .map(|m| !self.marker_is_fresh(&m, now))
                    .unwrap_or(true);
                if stale {
                    self.kv.remove(&key).await?;
                }
            }
        }

        if removed > 0 {
            info!(removed, "Cleaned up expired intentions");
        }
        Ok(removed)
    }

    /// Get the active intention, clearing it if expired.
    pub async fn get_active(&self) -> GateResult<Option<ActiveIntention>> {
        let Some(active) = read_active(&*self.kv).await? else {
            return Ok(None);
        };
        if active.is_expired_at(Utc::now()) {
            debug!(domain = %active.domain, "Active intention expired on read");
            remove_active(&*self.kv).await?;
            return Ok(None);
        }
        Ok(Some(active))
    }

    /// Set the active intention, replacing whatever was active before.
    ///
    /// Resets the accessible-sites set to exactly this domain and arms a
    /// timer that clears the intention when it expires, even if nobody reads
    /// it.
    pub async fn set_active(&self, domain: &str, text: &str) -> GateResult<ActiveIntention> {
        let now = Utc::now();
        let active = ActiveIntention {
            domain: normalize_domain(domain),
            intention_text: text.to_string(),
            start_time: now,
            expires_at: now + chrono_span(self.config.active_ttl()),
        };

        self.kv
            .set(ACTIVE_INTENTION_KEY, serde_json::to_value(&active)?)
            .await?;
        let sites: HashMap<String, bool> = HashMap::from([(active.domain.clone(), true)]);
        self.kv
            .set(ACCESSIBLE_SITES_KEY, serde_json::to_value(&sites)?)
            .await?;

        self.arm_expiry_timer(&active);
        info!(domain = %active.domain, "Active intention set");
        Ok(active)
    }

    /// Extend the active intention's expiry if it belongs to `domain`.
    pub async fn touch_active(&self, domain: &str) -> GateResult<Option<ActiveIntention>> {
        let domain = normalize_domain(domain);
        let Some(mut active) = self.get_active().await? else {
            return Ok(None);
        };
        if active.domain != domain {
            return Ok(None);
        }
        active.expires_at = Utc::now() + chrono_span(self.config.active_ttl());
        self.kv
            .set(ACTIVE_INTENTION_KEY, serde_json::to_value(&active)?)
            .await?;
        Ok(Some(active))
    }

    /// Clear the active intention.
    pub async fn clear_active(&self) -> GateResult<()> {
        self.disarm_expiry_timer();
        remove_active(&*self.kv).await?;
        info!("Active intention cleared");
        Ok(())
    }

    /// Clear the active intention only if it still belongs to `domain`.
    ///
    /// Returns whether anything was cleared. Used by late classifier results
    /// so they never clear an intention declared after they were issued.
    pub async fn clear_active_for(&self, domain: &str) -> GateResult<bool> {
        let domain = normalize_domain(domain);
        match self.get_active().await? {
            Some(active) if active.domain == domain => {
                self.clear_active().await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// The accessible-sites singleton.
    pub async fn accessible_sites(&self) -> GateResult<HashMap<String, bool>> {
        match self.kv.get(ACCESSIBLE_SITES_KEY).await? {
            None => Ok(HashMap::new()),
            Some(value) => serde_json::from_value(value)
                .map_err(|e| GateError::corrupted(ACCESSIBLE_SITES_KEY, e)),
        }
    }

    fn arm_expiry_timer(&self, active: &ActiveIntention) {
        let kv = self.kv.clone();
        let start_time = active.start_time;
        let handle = tokio::spawn(async move {
            loop {
                let current = match read_active(&*kv).await {
                    Ok(Some(current)) if current.start_time == start_time => current,
                    // Superseded, cleared, or unreadable: not ours to clear.
                    _ => return,
                };
                let now = Utc::now();
                if current.is_expired_at(now) {
                    if let Err(e) = remove_active(&*kv).await {
                        warn!(error = %e, "Failed to clear expired active intention");
                    } else {
                        debug!(domain = %current.domain, "Active intention expired by timer");
                    }
                    return;
                }
                let wait = (current.expires_at - now)
                    .to_std()
                    .unwrap_or_default()
                    + std::time::Duration::from_millis(1);
                tokio::time::sleep(wait).await;
            }
        });

        if let Ok(mut slot) = self.active_timer.lock() {
            if let Some(previous) = slot.replace(handle) {
                previous.abort();
            }
        }
    }

    fn disarm_expiry_timer(&self) {
        if let Ok(mut slot) = self.active_timer.lock() {
            if let Some(previous) = slot.take() {
                previous.abort();
            }
        }
    }
}

impl Drop for IntentionStore {
    fn drop(&mut self) {
        self.disarm_expiry_timer();
    }
}
