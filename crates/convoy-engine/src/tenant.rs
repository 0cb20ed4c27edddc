// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant registry: per-team credentials and rate limits.
//!
//! Entries are keyed by team id with a secondary index from the provider
//! phone-number id, used to route inbound webhooks. A [`TenantContext`] is
//! obtained per request and passed explicitly into every orchestrator call.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use convoy_config::model::TeamConfig;
use convoy_core::model::{RateLimits, Team};
use convoy_core::{Clock, ConvoyError, TeamId, TenantSource};
use dashmap::DashMap;
use secrecy::SecretString;
use tracing::{debug, info, warn};

/// Snapshot of an active tenant for the duration of one operation.
#[derive(Debug, Clone)]
pub struct TenantContext {
    team: Arc<Team>,
}

impl TenantContext {
    pub fn team(&self) -> &Team {
        &self.team
    }

    pub fn team_id(&self) -> TeamId {
        self.team.id
    }

    pub(crate) fn shared_team(&self) -> Arc<Team> {
        Arc::clone(&self.team)
    }
}

/// Fixed-window counters for one tenant.
#[derive(Debug)]
struct RateWindow {
    minute: i64,
    minute_count: u32,
    day: NaiveDate,
    day_count: u32,
}

impl RateWindow {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            minute: now.timestamp().div_euclid(60),
            minute_count: 0,
            day: now.date_naive(),
            day_count: 0,
        }
    }

    fn roll(&mut self, now: DateTime<Utc>) {
        let minute = now.timestamp().div_euclid(60);
        if minute != self.minute {
            self.minute = minute;
            self.minute_count = 0;
        }
        let day = now.date_naive();
        if day != self.day {
            self.day = day;
            self.day_count = 0;
        }
    }

    /// Non-consuming probe: the minute window must not be exhausted and the
    /// daily cap must fit `n` more messages.
    fn check(&mut self, limits: &RateLimits, n: u32, now: DateTime<Utc>) -> Result<(), &'static str> {
        self.roll(now);
        if self.minute_count >= limits.messages_per_minute {
            return Err("per-minute");
        }
        if let Some(per_day) = limits.messages_per_day {
            if self.day_count.saturating_add(n) > per_day {
                return Err("daily");
            }
        }
        Ok(())
    }

    fn acquire(&mut self, limits: &RateLimits, now: DateTime<Utc>) -> Result<(), &'static str> {
        self.roll(now);
        if self.minute_count >= limits.messages_per_minute {
            return Err("per-minute");
        }
        if limits.messages_per_day.is_some_and(|cap| self.day_count >= cap) {
            return Err("daily");
        }
        self.minute_count += 1;
        self.day_count += 1;
        Ok(())
    }
}

#[derive(Debug)]
struct TenantEntry {
    team: Arc<Team>,
    window: RateWindow,
}

/// Keyed table of tenants.
pub struct TenantRegistry {
    entries: DashMap<TeamId, TenantEntry>,
    numbers: DashMap<String, TeamId>,
    clock: Arc<dyn Clock>,
}

impl TenantRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            numbers: DashMap::new(),
            clock,
        }
    }

    /// Replace the tenant set. Existing teams keep their rate counters; teams
    /// absent from `teams` are removed.
    pub fn load(&self, teams: Vec<Team>) {
        let now = self.clock.now();
        let mut seen = Vec::with_capacity(teams.len());

        for team in teams {
            let id = team.id;
            seen.push(id);
            let team = Arc::new(team);

            match self.entries.get_mut(&id) {
                Some(mut entry) => {
                    if entry.team.phone_number_id != team.phone_number_id {
                        self.numbers.remove(&entry.team.phone_number_id);
                    }
                    entry.team = Arc::clone(&team);
                }
                None => {
                    self.entries.insert(
                        id,
                        TenantEntry {
                            team: Arc::clone(&team),
                            window: RateWindow::new(now),
                        },
                    );
                }
            }
            if !team.phone_number_id.is_empty() {
                self.numbers.insert(team.phone_number_id.clone(), id);
            }
            debug!(team_id = %id, active = team.active, "tenant loaded");
        }

        self.entries.retain(|id, _| seen.contains(id));
        self.numbers.retain(|_, id| seen.contains(id));
        info!(count = self.entries.len(), "tenant registry loaded");
    }

    /// Reload all tenants from `source`.
    pub async fn refresh(&self, source: &dyn TenantSource) -> Result<usize, ConvoyError> {
        let teams = source.load_teams().await?;
        let count = teams.len();
        self.load(teams);
        Ok(count)
    }

    /// Context for an active team.
    pub fn context(&self, team_id: TeamId) -> Result<TenantContext, ConvoyError> {
        let team = self.team(team_id).ok_or(ConvoyError::NoTenant {
            team_id: Some(team_id),
        })?;
        if !team.active {
            return Err(ConvoyError::TenantInactive { team_id });
        }
        Ok(TenantContext { team })
    }

    /// Team snapshot, active or not.
    pub fn team(&self, team_id: TeamId) -> Option<Arc<Team>> {
        self.entries.get(&team_id).map(|e| Arc::clone(&e.team))
    }

    /// Team owning a provider phone-number id, active or not.
    pub fn team_for_number(&self, phone_number_id: &str) -> Option<Arc<Team>> {
        let id = *self.numbers.get(phone_number_id)?;
        self.team(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reject up-front when the team cannot send `n` more messages now.
    pub fn check_capacity(&self, team_id: TeamId, n: u32) -> Result<(), ConvoyError> {
        let now = self.clock.now();
        let mut entry = self
            .entries
            .get_mut(&team_id)
            .ok_or(ConvoyError::NoTenant {
                team_id: Some(team_id),
            })?;
        let limits = entry.team.rate_limits;
        entry.window.check(&limits, n, now).map_err(|window| {
            warn!(team_id = %team_id, window, requested = n, "send rejected by rate limit");
            ConvoyError::RateLimited { team_id, window }
        })
    }

    /// Consume one permit for a single provider attempt.
    pub fn try_acquire(&self, team_id: TeamId) -> Result<(), ConvoyError> {
        let now = self.clock.now();
        let mut entry = self
            .entries
            .get_mut(&team_id)
            .ok_or(ConvoyError::NoTenant {
                team_id: Some(team_id),
            })?;
        let limits = entry.team.rate_limits;
        entry
            .window
            .acquire(&limits, now)
            .map_err(|window| ConvoyError::RateLimited { team_id, window })
    }
}

/// Build a [`Team`] from its `[[teams]]` entry.
pub fn team_from_config(config: &TeamConfig, default_api_version: &str) -> Team {
    Team {
        id: TeamId(config.id),
        name: config.name.clone(),
        phone_number_id: config.phone_number_id.clone(),
        access_token: SecretString::from(config.access_token.clone()),
        business_account_id: config.business_account_id.clone(),
        api_version: config
            .api_version
            .clone()
            .unwrap_or_else(|| default_api_version.to_string()),
        country_code: config.country_code.clone(),
        active: config.active,
        rate_limits: RateLimits {
            messages_per_minute: config.messages_per_minute,
            messages_per_day: config.messages_per_day,
        },
    }
}

/// Tenants declared in the configuration file.
pub struct ConfigTenantSource {
    teams: Vec<TeamConfig>,
    default_api_version: String,
}

impl ConfigTenantSource {
    pub fn new(teams: Vec<TeamConfig>, default_api_version: impl Into<String>) -> Self {
        Self {
            teams,
            default_api_version: default_api_version.into(),
        }
    }
}

#[async_trait]
impl TenantSource for ConfigTenantSource {
    async fn load_teams(&self) -> Result<Vec<Team>, ConvoyError> {
        Ok(self
            .teams
            .iter()
            .map(|t| team_from_config(t, &self.default_api_version))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use secrecy::ExposeSecret;
    use std::sync::Mutex;

    struct FixedClock(Mutex<DateTime<Utc>>);

    impl FixedClock {
        fn advance(&self, by: TimeDelta) {
            let mut now = self.0.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn team_config(id: i64, number: &str) -> TeamConfig {
        TeamConfig {
            id,
            name: format!("team {id}"),
            phone_number_id: number.to_string(),
            access_token: format!("token-{id}"),
            business_account_id: None,
            api_version: None,
            country_code: "31".into(),
            active: true,
            messages_per_minute: 2,
            messages_per_day: Some(3),
        }
    }

    fn registry() -> (TenantRegistry, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock(Mutex::new(
            Utc.with_ymd_and_hms(2026, 4, 1, 23, 58, 0).unwrap(),
        )));
        let registry = TenantRegistry::new(clock.clone());
        registry.load(vec![
            team_from_config(&team_config(1, "111"), "v21.0"),
            team_from_config(&team_config(2, "222"), "v21.0"),
        ]);
        (registry, clock)
    }

    #[test]
    fn context_rejects_unknown_and_inactive_teams() {
        let (registry, _) = registry();
        assert_eq!(registry.context(TeamId(1)).unwrap().team_id(), TeamId(1));
        assert!(matches!(
            registry.context(TeamId(9)),
            Err(ConvoyError::NoTenant { team_id: Some(TeamId(9)) })
        ));

        let mut inactive = team_config(2, "222");
        inactive.active = false;
        registry.load(vec![
            team_from_config(&team_config(1, "111"), "v21.0"),
            team_from_config(&inactive, "v21.0"),
        ]);
        assert!(matches!(
            registry.context(TeamId(2)),
            Err(ConvoyError::TenantInactive { .. })
        ));
        assert!(registry.team_for_number("222").is_some());
    }

    #[test]
    fn numbers_route_to_their_own_team_only() {
        let (registry, _) = registry();
        assert_eq!(registry.team_for_number("111").unwrap().id, TeamId(1));
        assert_eq!(registry.team_for_number("222").unwrap().id, TeamId(2));
        assert!(registry.team_for_number("333").is_none());
        assert_eq!(
            registry.team(TeamId(2)).unwrap().access_token.expose_secret(),
            "token-2"
        );
    }

    #[test]
    fn reload_drops_removed_teams_and_renumbers() {
        let (registry, _) = registry();
        registry.load(vec![team_from_config(&team_config(1, "999"), "v22.0")]);
        assert_eq!(registry.len(), 1);
        assert!(registry.team_for_number("111").is_none());
        assert!(registry.team_for_number("222").is_none());
        assert_eq!(registry.team_for_number("999").unwrap().api_version, "v22.0");
    }

    #[test]
    fn per_minute_window_resets() {
        let (registry, clock) = registry();
        registry.try_acquire(TeamId(1)).unwrap();
        registry.try_acquire(TeamId(1)).unwrap();
        assert!(matches!(
            registry.try_acquire(TeamId(1)),
            Err(ConvoyError::RateLimited { window: "per-minute", .. })
        ));
        assert!(registry.check_capacity(TeamId(1), 1).is_err());
        // Other tenants are unaffected.
        registry.try_acquire(TeamId(2)).unwrap();

        clock.advance(TimeDelta::seconds(60));
        registry.try_acquire(TeamId(1)).unwrap();
        assert!(matches!(
            registry.try_acquire(TeamId(1)),
            Err(ConvoyError::RateLimited { .. })
        ));
    }

    #[test]
    fn daily_cap_resets_at_utc_midnight() {
        let (registry, clock) = registry();
        registry.try_acquire(TeamId(1)).unwrap();
        registry.try_acquire(TeamId(1)).unwrap();
        clock.advance(TimeDelta::seconds(60));
        registry.try_acquire(TeamId(1)).unwrap();
        assert!(matches!(
            registry.check_capacity(TeamId(1), 1),
            Err(ConvoyError::RateLimited { window: "daily", .. })
        ));

        clock.advance(TimeDelta::minutes(2));
        registry.check_capacity(TeamId(1), 2).unwrap();
    }

    #[test]
    fn counters_survive_credential_refresh() {
        let (registry, _) = registry();
        registry.try_acquire(TeamId(1)).unwrap();
        registry.try_acquire(TeamId(1)).unwrap();
        registry.load(vec![team_from_config(&team_config(1, "111"), "v21.0")]);
        assert!(registry.try_acquire(TeamId(1)).is_err());
    }

    #[tokio::test]
    async fn refresh_from_config_source() {
        let clock = Arc::new(FixedClock(Mutex::new(Utc::now())));
        let registry = TenantRegistry::new(clock);
        let mut pinned = team_config(5, "555");
        pinned.api_version = Some("v19.0".into());
        let source = ConfigTenantSource::new(vec![pinned, team_config(6, "666")], "v21.0");

        assert_eq!(registry.refresh(&source).await.unwrap(), 2);
        assert_eq!(registry.team(TeamId(5)).unwrap().api_version, "v19.0");
        assert_eq!(registry.team(TeamId(6)).unwrap().api_version, "v21.0");
    }
}
