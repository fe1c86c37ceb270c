//! Subscription registry: names, slot ranges and request generation.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};
use xplane_udp_protocol::{CodecError, DatarefRequest, RREF_NAME_LEN};

use crate::error::{XPlaneError, XPlaneResult};
use crate::slots::SlotTable;

/// Opaque reference to a subscription.
///
/// Handles index an append-only sequence and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatarefHandle(usize);

impl DatarefHandle {
    /// Raw registry index, for diagnostics.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for DatarefHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One scalar or array subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    name: String,
    start: usize,
    len: usize,
    frequency: i32,
    available: bool,
    is_array: bool,
}

impl Subscription {
    /// Registry key: the full scalar name, or the base name of an array.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start(&self) -> usize {
        self.start
    }

    /// Last slot of the range (inclusive).
    pub fn end(&self) -> usize {
        self.start + self.len - 1
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn frequency(&self) -> i32 {
        self.frequency
    }

    /// `false` after `change_frequency(_, 0)` until reactivated.
    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn is_array(&self) -> bool {
        self.is_array
    }

    /// Name of the element stored at `start + offset`.
    pub fn element_name(&self, offset: usize) -> String {
        if self.is_array {
            element_name(&self.name, offset)
        } else {
            self.name.clone()
        }
    }

    /// One request per slot, at `frequency`.
    fn requests_at(&self, frequency: i32) -> Vec<DatarefRequest> {
        (0..self.len)
            .map(|offset| DatarefRequest {
                frequency,
                slot: slot_id(self.start + offset),
                name: self.element_name(offset),
            })
            .collect()
    }

    /// Requests that subscribe every element at the stored frequency.
    pub fn requests(&self) -> Vec<DatarefRequest> {
        self.requests_at(self.frequency)
    }
}

/// `base[i]`
pub fn element_name(base: &str, index: usize) -> String {
    format!("{base}[{index}]")
}

fn slot_id(slot: usize) -> i32 {
    i32::try_from(slot).unwrap_or(i32::MAX)
}

fn check_name(name: &str) -> XPlaneResult<()> {
    let needed = name.len() + 1;
    if needed > RREF_NAME_LEN {
        return Err(CodecError::buffer_too_small(needed, RREF_NAME_LEN).into());
    }
    Ok(())
}

fn check_frequency(frequency: i32) -> XPlaneResult<()> {
    if frequency < 0 {
        return Err(XPlaneError::InvalidFrequency(frequency));
    }
    Ok(())
}

/// Outcome of an add: the handle and the requests to transmit.
///
/// `requests` is empty when the name was already registered.
#[derive(Debug, Clone, PartialEq)]
pub struct Added {
    pub handle: DatarefHandle,
    pub requests: Vec<DatarefRequest>,
}

/// Name-to-slot bookkeeping plus the value table.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    slots: SlotTable,
    subscriptions: Vec<Subscription>,
    by_name: HashMap<String, usize>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of subscriptions ever added.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn slots(&self) -> &SlotTable {
        &self.slots
    }

    pub fn handle_of(&self, name: &str) -> Option<DatarefHandle> {
        self.by_name.get(name).copied().map(DatarefHandle)
    }

    pub fn get(&self, handle: DatarefHandle) -> XPlaneResult<&Subscription> {
        self.subscriptions
            .get(handle.0)
            .ok_or_else(|| XPlaneError::handle_out_of_range(handle.0, self.subscriptions.len()))
    }

    fn get_mut(&mut self, handle: DatarefHandle) -> XPlaneResult<&mut Subscription> {
        let count = self.subscriptions.len();
        self.subscriptions
            .get_mut(handle.0)
            .ok_or_else(|| XPlaneError::handle_out_of_range(handle.0, count))
    }

    pub fn iter(&self) -> impl Iterator<Item = (DatarefHandle, &Subscription)> {
        self.subscriptions
            .iter()
            .enumerate()
            .map(|(index, sub)| (DatarefHandle(index), sub))
    }

    /// Register a single-slot subscription keyed by its full name.
    ///
    /// # Errors
    ///
    /// Returns an error if `frequency` is negative or the name does not fit an
    /// `RREF` frame.
    pub fn add_scalar(&mut self, name: &str, frequency: i32) -> XPlaneResult<Added> {
        self.add(name, 1, frequency, false)
    }

    /// Register `len` contiguous slots keyed by the base name.
    ///
    /// # Errors
    ///
    /// Returns an error if `len` is zero, `frequency` is negative, or the
    /// longest element name does not fit an `RREF` frame.
    pub fn add_array(&mut self, name: &str, len: usize, frequency: i32) -> XPlaneResult<Added> {
        if len == 0 {
            return Err(XPlaneError::InvalidArrayLength(len));
        }
        self.add(name, len, frequency, true)
    }

    fn add(&mut self, name: &str, len: usize, frequency: i32, is_array: bool) -> XPlaneResult<Added> {
        check_frequency(frequency)?;
        if let Some(handle) = self.handle_of(name) {
            warn!(dataref = name, %handle, "Dataref already subscribed, reusing handle");
            return Ok(Added {
                handle,
                requests: Vec::new(),
            });
        }
        if is_array {
            check_name(&element_name(name, len - 1))?;
        } else {
            check_name(name)?;
        }

        let start = self.slots.find_space(len);
        let subscription = Subscription {
            name: name.to_string(),
            start,
            len,
            frequency,
            available: true,
            is_array,
        };
        let requests = subscription.requests();
        let index = self.subscriptions.len();
        self.subscriptions.push(subscription);
        self.by_name.insert(name.to_string(), index);
        debug!(dataref = name, start, len, frequency, "Subscription added");

        Ok(Added {
            handle: DatarefHandle(index),
            requests,
        })
    }

    /// Change the rate of a subscription and return the requests to send.
    ///
    /// Zero releases the slots and returns zero-rate requests for the old
    /// range so the simulator stops streaming; repeating it returns nothing.
    /// A non-zero rate on an inactive subscription reallocates a range of the
    /// same length.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown handles and negative frequencies.
    pub fn change_frequency(
        &mut self,
        handle: DatarefHandle,
        frequency: i32,
    ) -> XPlaneResult<Vec<DatarefRequest>> {
        check_frequency(frequency)?;
        let (start, len, available) = {
            let sub = self.get(handle)?;
            (sub.start, sub.len, sub.available)
        };

        if frequency == 0 {
            if !available {
                return Ok(Vec::new());
            }
            self.slots.release(start, len);
            let sub = self.get_mut(handle)?;
            let stop = sub.requests_at(0);
            sub.available = false;
            sub.frequency = 0;
            return Ok(stop);
        }

        let new_start = if available {
            start
        } else {
            self.slots.find_space(len)
        };
        let sub = self.get_mut(handle)?;
        sub.start = new_start;
        sub.available = true;
        sub.frequency = frequency;
        Ok(sub.requests())
    }

    /// Read the first element of a subscription.
    ///
    /// Writes `default` and returns `false` when the subscription is inactive.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown handles.
    pub fn read(&self, handle: DatarefHandle, out: &mut f32, default: f32) -> XPlaneResult<bool> {
        self.read_array(handle, std::slice::from_mut(out), default)
    }

    /// Copy `min(len, out.len())` values into `out`.
    ///
    /// Writes `default` over the same span and returns `false` when the
    /// subscription is inactive.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown handles.
    pub fn read_array(
        &self,
        handle: DatarefHandle,
        out: &mut [f32],
        default: f32,
    ) -> XPlaneResult<bool> {
        let sub = self.get(handle)?;
        if !sub.available {
            out.iter_mut().take(sub.len).for_each(|value| *value = default);
            return Ok(false);
        }
        self.slots.copy_range(sub.start, sub.len, out);
        Ok(true)
    }

    /// Store an inbound value. Returns `false` for free or unknown slots.
    pub fn apply_update(&mut self, slot: i32, value: f32) -> bool {
        match usize::try_from(slot) {
            Ok(slot) => self.slots.set_value(slot, value),
            Err(_) => false,
        }
    }

    /// Requests for every active subscription, in handle order.
    pub fn active_requests(&self) -> Vec<DatarefRequest> {
        self.subscriptions
            .iter()
            .filter(|sub| sub.available)
            .flat_map(Subscription::requests)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_scalar_add_emits_one_request() -> TestResult {
        let mut registry = SubscriptionRegistry::new();
        let added = registry.add_scalar("sim/cockpit2/gauges/indicators/airspeed_kts_pilot", 5)?;
        assert_eq!(added.requests.len(), 1);
        assert_eq!(added.requests[0].slot, 0);
        assert_eq!(added.requests[0].frequency, 5);

        let sub = registry.get(added.handle)?;
        assert_eq!(sub.start(), sub.end());
        assert!(!sub.is_array());
        Ok(())
    }

    #[test]
    fn test_duplicate_add_returns_same_handle() -> TestResult {
        let mut registry = SubscriptionRegistry::new();
        let first = registry.add_scalar("sim/time/total_running_time_sec", 1)?;
        let second = registry.add_scalar("sim/time/total_running_time_sec", 10)?;
        assert_eq!(first.handle, second.handle);
        assert!(second.requests.is_empty());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.slots().len(), 1);
        assert_eq!(registry.get(first.handle)?.frequency(), 1);
        Ok(())
    }

    #[test]
    fn test_array_elements_are_named_from_base() -> TestResult {
        let mut registry = SubscriptionRegistry::new();
        registry.add_scalar("a", 1)?;
        let added = registry.add_array("sim/flightmodel/engine/ENGN_N1_", 3, 2)?;
        let names: Vec<_> = added.requests.iter().map(|r| (r.slot, r.name.as_str())).collect();
        assert_eq!(
            names,
            vec![
                (1, "sim/flightmodel/engine/ENGN_N1_[0]"),
                (2, "sim/flightmodel/engine/ENGN_N1_[1]"),
                (3, "sim/flightmodel/engine/ENGN_N1_[2]"),
            ]
        );
        assert_eq!(registry.get(added.handle)?.end(), 3);
        Ok(())
    }

    #[test]
    fn test_indexed_scalar_and_array_coexist() -> TestResult {
        let mut registry = SubscriptionRegistry::new();
        let scalar = registry.add_scalar(&element_name("foo", 2), 1)?;
        let array = registry.add_array("foo", 4, 1)?;
        assert_ne!(scalar.handle, array.handle);
        assert_eq!(registry.handle_of("foo[2]"), Some(scalar.handle));
        assert_eq!(registry.handle_of("foo"), Some(array.handle));
        Ok(())
    }

    #[test]
    fn test_invalid_arguments() {
        let mut registry = SubscriptionRegistry::new();
        assert!(matches!(
            registry.add_array("x", 0, 1),
            Err(XPlaneError::InvalidArrayLength(0))
        ));
        assert!(matches!(
            registry.add_scalar("x", -1),
            Err(XPlaneError::InvalidFrequency(-1))
        ));
        let long = "n".repeat(RREF_NAME_LEN);
        assert!(matches!(
            registry.add_scalar(&long, 1),
            Err(XPlaneError::Codec(CodecError::BufferTooSmall { .. }))
        ));
        assert!(registry.is_empty());
        assert!(registry.slots().is_empty());
    }

    #[test]
    fn test_unknown_handle_is_an_error() -> TestResult {
        let mut other = SubscriptionRegistry::new();
        let foreign = other.add_scalar("x", 1)?.handle;

        let registry = SubscriptionRegistry::new();
        let mut value = 0.0;
        assert!(matches!(
            registry.read(foreign, &mut value, 0.0),
            Err(XPlaneError::HandleOutOfRange { handle: 0, count: 0 })
        ));
        Ok(())
    }

    #[test]
    fn test_deactivate_then_reactivate() -> TestResult {
        let mut registry = SubscriptionRegistry::new();
        let handle = registry.add_scalar("sim/a", 5)?.handle;
        assert!(registry.apply_update(0, 12.5));

        let stop = registry.change_frequency(handle, 0)?;
        assert_eq!(stop.len(), 1);
        assert_eq!(stop[0].frequency, 0);
        assert!(registry.change_frequency(handle, 0)?.is_empty());

        let mut value = 0.0;
        assert!(!registry.read(handle, &mut value, -1.0)?);
        assert_eq!(value, -1.0);
        assert!(!registry.apply_update(0, 3.0));

        let resumed = registry.change_frequency(handle, 2)?;
        assert_eq!(resumed.len(), 1);
        assert_eq!(resumed[0].frequency, 2);
        assert!(registry.read(handle, &mut value, -1.0)?);
        assert_eq!(registry.get(handle)?.frequency(), 2);
        Ok(())
    }

    #[test]
    fn test_reactivation_may_move_range() -> TestResult {
        let mut registry = SubscriptionRegistry::new();
        let array = registry.add_array("arr", 2, 1)?.handle;
        registry.change_frequency(array, 0)?;
        registry.add_scalar("filler", 1)?;
        registry.change_frequency(array, 1)?;
        // slot 0 went to the scalar; slot 1 alone is too small
        assert_eq!(registry.get(array)?.start(), 2);
        assert_eq!(registry.slots().len(), 4);
        Ok(())
    }

    #[test]
    fn test_rate_change_on_active_keeps_slots() -> TestResult {
        let mut registry = SubscriptionRegistry::new();
        let handle = registry.add_array("arr", 3, 1)?.handle;
        let requests = registry.change_frequency(handle, 20)?;
        let slots: Vec<_> = requests.iter().map(|r| r.slot).collect();
        assert_eq!(slots, vec![0, 1, 2]);
        assert!(requests.iter().all(|r| r.frequency == 20));
        Ok(())
    }

    #[test]
    fn test_array_read_truncates_to_buffer() -> TestResult {
        let mut registry = SubscriptionRegistry::new();
        let handle = registry.add_array("arr", 8, 1)?.handle;
        for slot in 0..8 {
            registry.apply_update(slot, slot as f32 * 10.0);
        }
        let mut out = [0.0f32; 4];
        assert!(registry.read_array(handle, &mut out, 0.0)?);
        assert_eq!(out, [0.0, 10.0, 20.0, 30.0]);
        Ok(())
    }

    #[test]
    fn test_updates_for_unknown_slots_are_discarded() -> TestResult {
        let mut registry = SubscriptionRegistry::new();
        registry.add_scalar("a", 1)?;
        assert!(!registry.apply_update(-1, 1.0));
        assert!(!registry.apply_update(5, 1.0));
        Ok(())
    }

    #[test]
    fn test_active_requests_skip_inactive() -> TestResult {
        let mut registry = SubscriptionRegistry::new();
        let a = registry.add_scalar("a", 1)?.handle;
        registry.add_array("b", 3, 4)?;
        registry.change_frequency(a, 0)?;
        let names: Vec<_> = registry
            .active_requests()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["b[0]", "b[1]", "b[2]"]);
        Ok(())
    }
}
