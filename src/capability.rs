//! Optional charger capabilities
//!
//! The catalog below is the single place where capabilities are declared.
//! Each entry expands into:
//!
//! - an async trait with one method (e.g. [`MeterEnergy`])
//! - a variant of the closed [`Capability`] tag enum
//! - a callable type and a binder on [`Bindings`]
//! - a forwarding wrapper that calls the bound callable
//! - an `as_*` accessor on [`CapabilitySet`] and on the composed charger
//!
//! Asking a charger whether it supports something is asking its accessor:
//!
//! ```rust,ignore
//! if let Some(meter) = charger.as_meter_energy() {
//!     let kwh = meter.total_energy().await?;
//! }
//! ```
//!
//! There is no way to call an unsupported capability, so there is no
//! "unsupported" runtime error either.

use crate::error::Result;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Boxed future returned by bound capability callables
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'static>>;

macro_rules! capability_catalog {
    ($(
        $(#[$meta:meta])*
        $tag:ident {
            accessor: $accessor:ident,
            bind: $bind:ident,
            callable: $callable:ident,
            wrapper: $wrapper:ident,
            fn $method:ident(&self $(, $arg:ident: $argty:ty)*) -> $ret:ty;
        }
    )+) => {
        $(
            $(#[$meta])*
            #[async_trait::async_trait]
            pub trait $tag: Send + Sync {
                async fn $method(&self $(, $arg: $argty)*) -> Result<$ret>;
            }

            #[doc = concat!("Callable bound to [`", stringify!($tag), "`]")]
            pub type $callable = Arc<dyn Fn($($argty),*) -> BoxFuture<$ret> + Send + Sync>;

            struct $wrapper {
                call: $callable,
            }

            #[async_trait::async_trait]
            impl $tag for $wrapper {
                async fn $method(&self $(, $arg: $argty)*) -> Result<$ret> {
                    (self.call)($($arg),*).await
                }
            }
        )+

        /// Closed catalog of optional capabilities
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Capability {
            $($tag),+
        }

        impl Capability {
            /// Every capability in catalog order
            pub const ALL: &'static [Capability] = &[$(Capability::$tag),+];

            pub fn name(self) -> &'static str {
                match self {
                    $(Capability::$tag => stringify!($tag)),+
                }
            }
        }

        /// Type query for optional capabilities. Every accessor defaults to
        /// `None`; a driver that implements a capability natively overrides
        /// the matching accessor to return itself.
        pub trait CapabilitySet {
            $(
                fn $accessor(&self) -> Option<&dyn $tag> {
                    None
                }
            )+

            /// Supported capabilities in catalog order
            fn capabilities(&self) -> Vec<Capability> {
                Capability::ALL
                    .iter()
                    .copied()
                    .filter(|&cap| self.supports(cap))
                    .collect()
            }

            fn supports(&self, cap: Capability) -> bool {
                match cap {
                    $(Capability::$tag => self.$accessor().is_some()),+
                }
            }
        }

        /// Capabilities discovered while constructing a driver, one optional
        /// callable per catalog entry. Consumed once by
        /// [`compose`](crate::compose::compose).
        #[derive(Default)]
        pub struct Bindings {
            $($accessor: Option<$callable>),+
        }

        impl Bindings {
            pub fn new() -> Self {
                Self::default()
            }

            $(
                #[doc = concat!("Bind [`", stringify!($tag), "`] to `f`")]
                pub fn $bind<F, Fut>(mut self, f: F) -> Self
                where
                    F: Fn($($argty),*) -> Fut + Send + Sync + 'static,
                    Fut: Future<Output = Result<$ret>> + Send + 'static,
                {
                    let call: $callable =
                        Arc::new(move |$($arg: $argty),*| -> BoxFuture<$ret> { Box::pin(f($($arg),*)) });
                    self.$accessor = Some(call);
                    self
                }
            )+

            /// Capabilities with a present binding, in catalog order
            pub fn present(&self) -> Vec<Capability> {
                let mut caps = Vec::new();
                $(
                    if self.$accessor.is_some() {
                        caps.push(Capability::$tag);
                    }
                )+
                caps
            }

            pub fn is_empty(&self) -> bool {
                $(self.$accessor.is_none())&&+
            }
        }

        /// A base charger plus forwarding wrappers for its bound capabilities
        pub(crate) struct Decorated<B: ?Sized> {
            pub(crate) base: Arc<B>,
            $($accessor: Option<$wrapper>),+
        }

        impl<B: ?Sized> Decorated<B> {
            pub(crate) fn new(base: Arc<B>, bindings: Bindings) -> Self {
                Self {
                    base,
                    $($accessor: bindings.$accessor.map(|call| $wrapper { call })),+
                }
            }
        }

        impl<B: CapabilitySet + ?Sized> CapabilitySet for Decorated<B> {
            $(
                fn $accessor(&self) -> Option<&dyn $tag> {
                    match &self.$accessor {
                        Some(wrapper) => Some(wrapper as &dyn $tag),
                        None => self.base.$accessor(),
                    }
                }
            )+
        }
    };
}

capability_catalog! {
    /// Lifetime energy counter, in kWh
    MeterEnergy {
        accessor: as_meter_energy,
        bind: with_meter_energy,
        callable: MeterEnergyFn,
        wrapper: MeterEnergyImpl,
        fn total_energy(&self) -> f64;
    }

    /// Switch between one and three active phases
    ChargePhases {
        accessor: as_charge_phases,
        bind: with_charge_phases,
        callable: ChargePhasesFn,
        wrapper: ChargePhasesImpl,
        fn phases_1p3p(&self, phases: u8) -> ();
    }

    /// Trigger the device's wake-up action
    AlarmClock {
        accessor: as_alarm_clock,
        bind: with_alarm_clock,
        callable: AlarmClockFn,
        wrapper: AlarmClockImpl,
        fn wake_up(&self) -> ();
    }

    /// Current charge power, in W
    Meter {
        accessor: as_meter,
        bind: with_meter,
        callable: MeterFn,
        wrapper: MeterImpl,
        fn current_power(&self) -> f64;
    }

    /// Energy charged in the running session, in kWh
    ChargeRater {
        accessor: as_charge_rater,
        bind: with_charge_rater,
        callable: ChargeRaterFn,
        wrapper: ChargeRaterImpl,
        fn charged_energy(&self) -> f64;
    }

    /// Per-phase currents L1..L3, in A
    MeterCurrent {
        accessor: as_meter_current,
        bind: with_meter_current,
        callable: MeterCurrentFn,
        wrapper: MeterCurrentImpl,
        fn currents(&self) -> (f64, f64, f64);
    }

    /// Duration of the running session
    ChargeTimer {
        accessor: as_charge_timer,
        bind: with_charge_timer,
        callable: ChargeTimerFn,
        wrapper: ChargeTimerImpl,
        fn charging_time(&self) -> Duration;
    }

    /// Device identification as label/value pairs
    Diagnosis {
        accessor: as_diagnosis,
        bind: with_diagnosis,
        callable: DiagnosisFn,
        wrapper: DiagnosisImpl,
        fn diagnose(&self) -> Vec<(String, String)>;
    }

    /// Fractional current setpoint, in A
    ChargerEx {
        accessor: as_charger_ex,
        bind: with_charger_ex,
        callable: ChargerExFn,
        wrapper: ChargerExImpl,
        fn max_current_millis(&self, current: f64) -> ();
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Debug for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Bindings").field(&self.present()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare;
    impl CapabilitySet for Bare {}

    #[test]
    fn catalog_is_complete_and_ordered() {
        assert_eq!(Capability::ALL.len(), 9);
        assert_eq!(Capability::ALL[0], Capability::MeterEnergy);
        assert_eq!(Capability::ChargePhases.to_string(), "ChargePhases");
    }

    #[test]
    fn default_set_supports_nothing() {
        let bare = Bare;
        assert!(bare.capabilities().is_empty());
        assert!(bare.as_meter_energy().is_none());
        assert!(!bare.supports(Capability::AlarmClock));
    }

    #[test]
    fn bindings_track_presence() {
        let bindings = Bindings::new();
        assert!(bindings.is_empty());

        let bindings = bindings
            .with_alarm_clock(|| async { Ok(()) })
            .with_charge_phases(|_phases| async { Ok(()) });
        assert!(!bindings.is_empty());
        assert_eq!(
            bindings.present(),
            vec![Capability::ChargePhases, Capability::AlarmClock]
        );
        assert_eq!(
            format!("{:?}", bindings),
            "Bindings([ChargePhases, AlarmClock])"
        );
    }
}
