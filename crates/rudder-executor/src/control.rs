//! Operations commands.
//!
//! Each command is a permission check, one store merge and one audit
//! event. Denied commands are audited as FAIL and leave the store
//! untouched.

use std::collections::BTreeMap;
use std::sync::Arc;

use rudder_risk::{AllocatorConfig, RiskLimits};
use rudder_state::{RuntimeState, RuntimeStatePatch, RuntimeStateStore, SpotPatch};
use rudder_telemetry::Metrics;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::access::{Capability, Grants};
use crate::audit::{AuditEvent, AuditSink};
use crate::error::{ControlError, ControlResult};

pub struct OpsController {
    store: Arc<RuntimeStateStore>,
    audit: Arc<dyn AuditSink>,
}

impl OpsController {
    pub fn new(store: Arc<RuntimeStateStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Current state, for callers allowed to view it.
    pub fn state(&self, caller: &Grants) -> ControlResult<Arc<RuntimeState>> {
        self.authorize(caller, Capability::ViewState, "view_state")?;
        Ok(self.store.get())
    }

    pub fn set_auto_mode(&self, caller: &Grants, on: bool) -> ControlResult<Arc<RuntimeState>> {
        let action = format!("auto_mode={on}");
        self.authorize(caller, Capability::ControlModes, &action)?;
        Ok(self.commit(caller, &action, "auto_mode", RuntimeStatePatch::new().auto_mode(on)))
    }

    /// Engage the global stop. Gates future signals only.
    pub fn stop_all(&self, caller: &Grants) -> ControlResult<Arc<RuntimeState>> {
        let action = "global_stop=true";
        self.authorize(caller, Capability::ControlModes, action)?;
        Ok(self.commit(caller, action, "global_stop", RuntimeStatePatch::new().global_stop(true)))
    }

    pub fn start_all(&self, caller: &Grants) -> ControlResult<Arc<RuntimeState>> {
        let action = "global_stop=false";
        self.authorize(caller, Capability::ControlModes, action)?;
        Ok(self.commit(
            caller,
            action,
            "global_stop",
            RuntimeStatePatch::new().global_stop(false),
        ))
    }

    /// Generic merge.
    ///
    /// Mode toggles need `ControlModes`; a patch touching capital
    /// (reserves, ops, equity override, spot weights) also needs
    /// `ManageCapital`, and one touching per-trade limits `ManageRisk`.
    pub fn update_state(
        &self,
        caller: &Grants,
        patch: RuntimeStatePatch,
    ) -> ControlResult<Arc<RuntimeState>> {
        let action = "update_state";
        for capability in required_capabilities(&patch) {
            self.authorize(caller, capability, action)?;
        }
        self.commit_checked(caller, action, "state", patch)
    }

    /// Set the fraction of equity the allocator may deploy.
    pub fn set_cap_pct(&self, caller: &Grants, pct: Decimal) -> ControlResult<Arc<RuntimeState>> {
        let action = "cap_pct";
        self.authorize(caller, Capability::ManageCapital, action)?;
        let patch = RuntimeStatePatch::new().cap_pct(pct);
        self.commit_checked(caller, action, "ops.capital.cap_pct", patch)
    }

    /// Merge named reserves into the current set.
    pub fn set_reserves(
        &self,
        caller: &Grants,
        reserves: BTreeMap<String, Decimal>,
    ) -> ControlResult<Arc<RuntimeState>> {
        let action = "reserves";
        self.authorize(caller, Capability::ManageCapital, action)?;
        let patch = RuntimeStatePatch {
            reserves: Some(reserves),
            ..RuntimeStatePatch::default()
        };
        self.commit_checked(caller, action, "reserves", patch)
    }

    pub fn set_strategy_weights(
        &self,
        caller: &Grants,
        weights: BTreeMap<String, Decimal>,
        enabled: Option<bool>,
    ) -> ControlResult<Arc<RuntimeState>> {
        let action = "spot_weights";
        self.authorize(caller, Capability::ManageCapital, action)?;
        let patch = RuntimeStatePatch::new().spot(SpotPatch {
            enabled,
            weights: Some(weights),
            ..SpotPatch::default()
        });
        self.commit_checked(caller, action, "spot.weights", patch)
    }

    pub fn update_spot_risk(
        &self,
        caller: &Grants,
        spot: SpotPatch,
    ) -> ControlResult<Arc<RuntimeState>> {
        let action = "spot_risk";
        self.authorize(caller, Capability::ManageRisk, action)?;
        let patch = RuntimeStatePatch::new().spot(spot);
        self.commit_checked(caller, action, "spot", patch)
    }

    fn authorize(&self, caller: &Grants, capability: Capability, action: &str) -> ControlResult<()> {
        if caller.permits(capability) {
            return Ok(());
        }
        warn!(subject = %caller.subject, action, ?capability, "Command denied");
        self.audit.record(
            AuditEvent::fail(action)
                .actor(caller.subject.clone())
                .metadata(serde_json::json!({ "reason": "forbidden", "capability": capability })),
        );
        Err(ControlError::Forbidden {
            subject: caller.subject.clone(),
            capability,
        })
    }

    /// Merge `patch` unless the merged state would be unusable.
    ///
    /// Validation and merge happen under the store's writer lock, so two
    /// commands that are each valid alone cannot combine into a bad state.
    fn commit_checked(
        &self,
        caller: &Grants,
        action: &str,
        target: &str,
        patch: RuntimeStatePatch,
    ) -> ControlResult<Arc<RuntimeState>> {
        let metadata = serde_json::to_value(&patch).unwrap_or_default();
        match self.store.try_set(patch, validate_state) {
            Ok(state) => Ok(self.committed(caller, action, target, metadata, state)),
            Err(msg) => {
                warn!(subject = %caller.subject, action, error = %msg, "Command rejected");
                self.audit.record(
                    AuditEvent::fail(action)
                        .actor(caller.subject.clone())
                        .metadata(serde_json::json!({ "reason": "invalid_value", "error": msg })),
                );
                Err(ControlError::InvalidValue(msg))
            }
        }
    }

    fn commit(
        &self,
        caller: &Grants,
        action: &str,
        target: &str,
        patch: RuntimeStatePatch,
    ) -> Arc<RuntimeState> {
        let metadata = serde_json::to_value(&patch).unwrap_or_default();
        let state = self.store.set(patch);
        self.committed(caller, action, target, metadata, state)
    }

    fn committed(
        &self,
        caller: &Grants,
        action: &str,
        target: &str,
        metadata: serde_json::Value,
        state: Arc<RuntimeState>,
    ) -> Arc<RuntimeState> {
        Metrics::state_updated(action);
        info!(subject = %caller.subject, action, version = self.store.version(), "State updated");
        self.audit.record(
            AuditEvent::ok(action)
                .actor(caller.subject.clone())
                .target(target)
                .metadata(metadata),
        );
        state
    }
}

fn required_capabilities(patch: &RuntimeStatePatch) -> Vec<Capability> {
    let mut caps = vec![Capability::ControlModes];
    let spot_weights = patch.spot.as_ref().is_some_and(|s| s.weights.is_some());
    if patch.reserves.is_some() || patch.ops.is_some() || patch.portfolio_equity.is_some() || spot_weights
    {
        caps.push(Capability::ManageCapital);
    }
    if patch.spot.as_ref().is_some_and(SpotPatch::touches_risk) {
        caps.push(Capability::ManageRisk);
    }
    caps
}

fn validate_state(state: &RuntimeState) -> Result<(), String> {
    let capital = &state.ops.capital;
    if capital.hard_max_pct < Decimal::ZERO || capital.hard_max_pct > Decimal::ONE {
        return Err(format!(
            "hard_max_pct must be in [0, 1], got {}",
            capital.hard_max_pct
        ));
    }
    if capital.cap_pct < Decimal::ZERO || capital.cap_pct > capital.hard_max_pct {
        return Err(format!(
            "cap_pct must be in [0, {}], got {}",
            capital.hard_max_pct, capital.cap_pct
        ));
    }
    if let Some((name, amount)) = state.reserves.iter().find(|(_, v)| v.is_sign_negative()) {
        return Err(format!("reserve {name} must be >= 0, got {amount}"));
    }
    if let Some((name, weight)) = state.spot.weights.iter().find(|(_, v)| v.is_sign_negative()) {
        return Err(format!("weight {name} must be >= 0, got {weight}"));
    }
    if let Some(equity) = state.portfolio_equity {
        if equity.is_sign_negative() {
            return Err(format!("portfolio_equity must be >= 0, got {equity}"));
        }
    }
    AllocatorConfig::from_spot(&state.spot)
        .validate()
        .map_err(|e| e.to_string())?;
    RiskLimits::from_state(state)
        .validate()
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Role;
    use crate::audit::{AuditOutcome, MemoryAuditSink};
    use rudder_state::{CapitalPatch, OpsPatch};
    use rust_decimal_macros::dec;
    use std::sync::Barrier;

    fn controller() -> (OpsController, Arc<RuntimeStateStore>, Arc<MemoryAuditSink>) {
        let store = Arc::new(RuntimeStateStore::default());
        let audit = Arc::new(MemoryAuditSink::new());
        (
            OpsController::new(Arc::clone(&store), audit.clone()),
            store,
            audit,
        )
    }

    #[test]
    fn test_trader_toggles_modes() {
        let (ops, store, audit) = controller();
        let trader = Grants::new("alice", Role::Trader);

        let state = ops.set_auto_mode(&trader, true).unwrap();
        assert!(state.auto_mode);
        let state = ops.stop_all(&trader).unwrap();
        assert!(state.global_stop);
        let state = ops.start_all(&trader).unwrap();
        assert!(!state.global_stop);
        assert!(store.get().auto_mode);

        let events = audit.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].action, "auto_mode=true");
        assert_eq!(events[1].action, "global_stop=true");
        assert!(events.iter().all(|e| e.result == AuditOutcome::Ok));
        assert_eq!(events[0].actor.as_deref(), Some("alice"));
    }

    #[test]
    fn test_denied_command_is_audited_and_ignored() {
        let (ops, store, audit) = controller();
        let user = Grants::new("bob", Role::User);
        let before = store.version();

        let result = ops.stop_all(&user);
        assert!(matches!(result, Err(ControlError::Forbidden { .. })));
        assert_eq!(store.version(), before);
        assert!(!store.get().global_stop);

        let events = audit.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].result, AuditOutcome::Fail);
    }

    #[test]
    fn test_capital_needs_admin() {
        let (ops, _store, _audit) = controller();
        let trader = Grants::new("alice", Role::Trader);
        assert!(matches!(
            ops.set_cap_pct(&trader, dec!(0.5)),
            Err(ControlError::Forbidden { .. })
        ));
        let token = Grants::from_ops_token("t0k", "t0k");
        let state = ops.set_cap_pct(&token, dec!(0.5)).unwrap();
        assert_eq!(state.ops.capital.cap_pct, dec!(0.5));
    }

    #[test]
    fn test_cap_pct_bounds() {
        let (ops, store, audit) = controller();
        let admin = Grants::new("root", Role::Admin);

        assert!(matches!(
            ops.set_cap_pct(&admin, dec!(1.5)),
            Err(ControlError::InvalidValue(_))
        ));
        assert!(matches!(
            ops.set_cap_pct(&admin, dec!(-0.1)),
            Err(ControlError::InvalidValue(_))
        ));
        assert_eq!(store.get().ops.capital.cap_pct, dec!(0.25));
        assert_eq!(audit.by_action("cap_pct").len(), 2);
    }

    #[test]
    fn test_racing_capital_commands_keep_cap_under_hard_max() {
        // cap 0.9 is valid under hard_max 1, and hard_max 0.5 is valid
        // under cap 0.25, but not both together.
        for _ in 0..50 {
            let (ops, store, _) = controller();
            let ops = Arc::new(ops);
            let barrier = Arc::new(Barrier::new(2));
            let admin = Grants::new("root", Role::Admin);

            let raise_cap = {
                let (ops, barrier, admin) = (Arc::clone(&ops), Arc::clone(&barrier), admin.clone());
                std::thread::spawn(move || {
                    barrier.wait();
                    ops.set_cap_pct(&admin, dec!(0.9)).is_ok()
                })
            };
            let lower_max = {
                let (ops, barrier, admin) = (Arc::clone(&ops), Arc::clone(&barrier), admin.clone());
                std::thread::spawn(move || {
                    let patch = RuntimeStatePatch {
                        ops: Some(OpsPatch {
                            capital: Some(CapitalPatch {
                                hard_max_pct: Some(dec!(0.5)),
                                ..CapitalPatch::default()
                            }),
                            ..OpsPatch::default()
                        }),
                        ..RuntimeStatePatch::default()
                    };
                    barrier.wait();
                    ops.update_state(&admin, patch).is_ok()
                })
            };

            let raised = raise_cap.join().unwrap();
            let lowered = lower_max.join().unwrap();
            assert!(raised ^ lowered, "exactly one command must win");

            let capital = store.get().ops.capital.clone();
            assert!(capital.cap_pct <= capital.hard_max_pct);
            assert_eq!(store.version(), 1);
        }
    }

    #[test]
    fn test_reserves_merge() {
        let (ops, _store, _audit) = controller();
        let admin = Grants::new("root", Role::Admin);

        ops.set_reserves(&admin, BTreeMap::from([("arbitrage".to_string(), dec!(500))]))
            .unwrap();
        let state = ops
            .set_reserves(&admin, BTreeMap::from([("hedge".to_string(), dec!(100))]))
            .unwrap();
        assert_eq!(state.reserves["arbitrage"], dec!(500));
        assert_eq!(state.reserves["hedge"], dec!(100));
        assert_eq!(state.reserves["portfolio"], dec!(0));

        assert!(matches!(
            ops.set_reserves(&admin, BTreeMap::from([("x".to_string(), dec!(-1))])),
            Err(ControlError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_strategy_weights() {
        let (ops, _store, _audit) = controller();
        let admin = Grants::new("root", Role::Admin);
        let state = ops
            .set_strategy_weights(
                &admin,
                BTreeMap::from([("trend_follow".to_string(), dec!(2))]),
                Some(false),
            )
            .unwrap();
        assert_eq!(state.spot.weights["trend_follow"], dec!(2));
        assert!(!state.spot.enabled);
    }

    #[test]
    fn test_spot_risk_validation() {
        let (ops, _store, _audit) = controller();
        let admin = Grants::new("root", Role::Admin);

        let state = ops
            .update_spot_risk(
                &admin,
                SpotPatch {
                    max_trade_pct: Some(dec!(0.1)),
                    ..SpotPatch::default()
                },
            )
            .unwrap();
        assert_eq!(state.spot.max_trade_pct, dec!(0.1));

        let bad = SpotPatch {
            max_symbol_exposure_pct: Some(dec!(3)),
            ..SpotPatch::default()
        };
        assert!(matches!(
            ops.update_spot_risk(&admin, bad),
            Err(ControlError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_update_state_escalates_capability() {
        let (ops, _store, _audit) = controller();
        let trader = Grants::new("alice", Role::Trader);

        assert!(ops
            .update_state(&trader, RuntimeStatePatch::new().arb_on(true))
            .is_ok());
        assert!(matches!(
            ops.update_state(&trader, RuntimeStatePatch::new().reserve("x", dec!(1))),
            Err(ControlError::Forbidden {
                capability: Capability::ManageCapital,
                ..
            })
        ));
    }

    #[test]
    fn test_idempotent_toggle_keeps_version() {
        let (ops, store, _audit) = controller();
        let trader = Grants::new("alice", Role::Trader);
        ops.set_auto_mode(&trader, true).unwrap();
        let version = store.version();
        ops.set_auto_mode(&trader, true).unwrap();
        assert_eq!(store.version(), version);
    }

    #[test]
    fn test_view_state() {
        let (ops, _store, _audit) = controller();
        assert!(ops.state(&Grants::new("u", Role::User)).is_ok());
        assert!(ops.state(&Grants::new("u", Role::User).inactive()).is_err());
    }
}
