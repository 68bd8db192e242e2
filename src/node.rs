// src/node.rs
//
// `Node`: the composition root (spec.md Section 2). Owns every
// subsystem array directly rather than through back-pointers (spec.md
// Section 9 "Cyclic references") — components hand back tagged results
// (`ObjectTypeKind`, `TimerCallback`, `SdoClientEvent`) and `Node` is the
// only thing that ever touches two subsystems in the same call.

use crate::emcy::{EmcyManager, ErrorClass};
use crate::frame::{
    default_emcy_cob_id, default_heartbeat_cob_id, default_rpdo_cob_id,
    default_sdo_request_cob_id, default_sdo_response_cob_id, default_tpdo_cob_id, CanFrame, CobId,
};
use crate::hal::{CanInterface, NvmInterface, TimerInterface};
use crate::nmt::{
    decode_consumer_entry, HeartbeatConsumers, MessageCategory, NmtEvent, NmtStateMachine,
    NmtState, ResetScope,
};
use crate::od::{ObjectDictionary, ObjectTypeKind, ObjectValue, PdoDirection, MAX_HEARTBEAT_CONSUMERS};
use crate::pdo::{MappingLinkTable, PdoMapping, PdoMappingEntry, Rpdo, Tpdo, TransmissionType};
use crate::sdo::SdoServer;
#[cfg(feature = "sdo-client")]
use crate::sdo::{SdoClient, SdoClientEvent};
use crate::sync::SyncCoordinator;
use crate::log::{my_debug, my_warn};
use crate::timer::{TimerCallback, TimerWheel};
use crate::types::NodeId;
use crate::CanOpenError;
use alloc::vec::Vec;

/// Application hook for boundary events the core stack cannot decide
/// for itself (spec.md Section 1, "Application-level callback hooks").
/// Every method has a no-op default, so an application that only cares
/// about protocol correctness can ignore this entirely.
pub trait NodeCallbacks {
    /// Fired whenever the NMT state machine changes state, including
    /// resets (spec.md Section 4.7 "fires the application's mode-change
    /// callback and the reset callback for reset transitions").
    fn on_mode_change(&mut self, _state: NmtState) {}
}

/// Composition root (spec.md Section 2 "Node"). Aggregates the Object
/// Dictionary, the timer wheel, NMT, EMCY, SYNC, one or more SDO
/// servers (and optional clients), and the RPDO/TPDO arrays with their
/// shared mapping-link table. Every incoming CAN frame and every fired
/// timer callback passes through here.
pub struct Node<'a> {
    node_id: NodeId,
    can: &'a mut dyn CanInterface,
    timer_driver: &'a mut dyn TimerInterface,
    tick_freq_hz: u32,
    dict: ObjectDictionary<'a>,
    timers: TimerWheel,
    nmt: NmtStateMachine,
    heartbeat_consumers: HeartbeatConsumers,
    heartbeat_producer_timer: Option<u32>,
    emcy: EmcyManager,
    sdo_servers: Vec<SdoServer>,
    #[cfg(feature = "sdo-client")]
    sdo_clients: Vec<SdoClient>,
    rpdos: Vec<Rpdo>,
    tpdos: Vec<Tpdo>,
    link_table: MappingLinkTable,
    sync: SyncCoordinator,
    last_error: Option<CanOpenError>,
    callbacks: Option<&'a mut dyn NodeCallbacks>,
}

impl<'a> Node<'a> {
    /// Builds a Node around its driver bundle. `tick_freq_hz` is the
    /// rate the timer driver will be told to run at in `start` — every
    /// millisecond- and microsecond-denominated Object (heartbeat
    /// period, SYNC cycle, inhibit time) is converted to wheel ticks
    /// against this frequency.
    pub fn new(
        node_id: NodeId,
        can: &'a mut dyn CanInterface,
        timer_driver: &'a mut dyn TimerInterface,
        nvm: Option<&'a mut dyn NvmInterface>,
        tick_freq_hz: u32,
    ) -> Self {
        let id: u8 = node_id.into();
        let dict = ObjectDictionary::new(node_id, nvm);
        Self {
            node_id,
            can,
            timer_driver,
            tick_freq_hz: tick_freq_hz.max(1),
            dict,
            timers: TimerWheel::new(),
            nmt: NmtStateMachine::new(node_id),
            heartbeat_consumers: HeartbeatConsumers::new(MAX_HEARTBEAT_CONSUMERS),
            heartbeat_producer_timer: None,
            emcy: EmcyManager::new(),
            sdo_servers: alloc::vec![SdoServer::new(
                default_sdo_request_cob_id(id),
                default_sdo_response_cob_id(id)
            )],
            #[cfg(feature = "sdo-client")]
            sdo_clients: Vec::new(),
            rpdos: Vec::new(),
            tpdos: Vec::new(),
            link_table: MappingLinkTable::new(),
            sync: SyncCoordinator::new(),
            last_error: None,
            callbacks: None,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn nmt_state(&self) -> NmtState {
        self.nmt.state()
    }

    pub fn dictionary(&self) -> &ObjectDictionary<'a> {
        &self.dict
    }

    pub fn dictionary_mut(&mut self) -> &mut ObjectDictionary<'a> {
        &mut self.dict
    }

    pub fn last_error(&self) -> Option<CanOpenError> {
        self.last_error
    }

    pub fn clear_last_error(&mut self) {
        self.last_error = None;
    }

    pub fn set_callbacks(&mut self, callbacks: &'a mut dyn NodeCallbacks) {
        self.callbacks = Some(callbacks);
    }

    /// Adds one more Receive PDO channel. Channels must be added in
    /// order (0, 1, 2, ...) since the channel number doubles as this
    /// node's RPDO array index.
    pub fn add_rpdo(&mut self, channel: u8) {
        debug_assert_eq!(channel as usize, self.rpdos.len(), "RPDO channels must be added in order");
        self.dict.add_rpdo_channel(channel);
        let id: u8 = self.node_id.into();
        self.rpdos.push(Rpdo::new(default_rpdo_cob_id(channel, id)));
    }

    /// Adds one more Transmit PDO channel; same ordering constraint as
    /// `add_rpdo`.
    pub fn add_tpdo(&mut self, channel: u8) {
        debug_assert_eq!(channel as usize, self.tpdos.len(), "TPDO channels must be added in order");
        self.dict.add_tpdo_channel(channel);
        let id: u8 = self.node_id.into();
        self.tpdos.push(Tpdo::new(default_tpdo_cob_id(channel, id)));
    }

    /// Adds an additional SDO server channel beyond the mandatory
    /// 0x1200 pair. `Node` always starts with one (index 0).
    pub fn add_sdo_server(&mut self, request_cob_id: u32, response_cob_id: u32) {
        self.sdo_servers
            .push(SdoServer::new(request_cob_id, response_cob_id));
    }

    #[cfg(feature = "sdo-client")]
    pub fn add_sdo_client(&mut self, target_node_id: NodeId, request_cob_id: u32, response_cob_id: u32) {
        self.sdo_clients
            .push(SdoClient::new(target_node_id, request_cob_id, response_cob_id));
    }

    /// Issues an upload (read) request from SDO client channel
    /// `client_idx` toward its configured target node, arming the
    /// timeout timer (spec.md Section 4.4).
    #[cfg(feature = "sdo-client")]
    pub fn sdo_client_request_upload(
        &mut self,
        client_idx: usize,
        index: u16,
        sub_index: u8,
        retries: u8,
    ) -> Result<(), CanOpenError> {
        let client = self
            .sdo_clients
            .get_mut(client_idx)
            .ok_or(CanOpenError::InternalError("no such sdo client"))?;
        let frame = client
            .request_upload(index, sub_index, retries)
            .map_err(CanOpenError::from)?;
        self.can.send(&frame)?;
        let ticks = self.sdo_clients[client_idx].timeout_ticks.max(1);
        let id = self.timers.schedule(ticks, 0, TimerCallback::SdoClientTimeout);
        self.sdo_clients[client_idx].timer_id = Some(id);
        Ok(())
    }

    /// Issues a download (write) request from SDO client channel
    /// `client_idx`; symmetric to `sdo_client_request_upload`.
    #[cfg(feature = "sdo-client")]
    pub fn sdo_client_request_download(
        &mut self,
        client_idx: usize,
        index: u16,
        sub_index: u8,
        data: &[u8],
        retries: u8,
    ) -> Result<(), CanOpenError> {
        let client = self
            .sdo_clients
            .get_mut(client_idx)
            .ok_or(CanOpenError::InternalError("no such sdo client"))?;
        let frame = client
            .request_download(index, sub_index, data, retries)
            .map_err(CanOpenError::from)?;
        self.can.send(&frame)?;
        let ticks = self.sdo_clients[client_idx].timeout_ticks.max(1);
        let id = self.timers.schedule(ticks, 0, TimerCallback::SdoClientTimeout);
        self.sdo_clients[client_idx].timer_id = Some(id);
        Ok(())
    }

    /// Writes an Object Dictionary entry from application code (as
    /// opposed to an incoming SDO/PDO frame), running whatever side
    /// effect the entry's `ObjectTypeKind` requires just like the
    /// protocol-driven paths do.
    pub fn write_object(&mut self, index: u16, sub_index: u8, value: ObjectValue) -> Result<(), CanOpenError> {
        let kind = self.dict.write(index, sub_index, value)?;
        self.after_write(index, sub_index, kind);
        Ok(())
    }

    pub fn read_object(&self, index: u16, sub_index: u8) -> Result<ObjectValue, CanOpenError> {
        self.dict.read(index, sub_index)
    }

    /// Raises (sets) an EMCY error, per spec.md Section 4.8.
    pub fn raise_error(
        &mut self,
        code: u16,
        class: ErrorClass,
        manufacturer: [u8; 5],
    ) -> Result<(), CanOpenError> {
        let id: u8 = self.node_id.into();
        let cob_id = self.emcy_cob_id();
        if let Some(frame) = self.emcy.set_error(id, cob_id, false, code, class, manufacturer) {
            self.dict.push_error_history(code);
            self.sync_error_register();
            self.can.send(&frame)?;
        }
        Ok(())
    }

    /// Clears a previously raised EMCY error, per spec.md Section 4.8.
    pub fn clear_error(&mut self, code: u16, class: ErrorClass) -> Result<(), CanOpenError> {
        let cob_id = self.emcy_cob_id();
        let frame = self.emcy.clear_error(cob_id, false, code, class);
        self.sync_error_register();
        if let Some(frame) = frame {
            self.can.send(&frame)?;
        }
        Ok(())
    }

    /// Reads Object 0x1014 fresh on every call rather than caching it,
    /// mirroring `sync_can_id` — it is a `Plain`-kind object with no
    /// `ObjectTypeKind` to notify `Node` of a later write.
    fn emcy_cob_id(&self) -> u32 {
        let id: u8 = self.node_id.into();
        match self.dict.read(0x1014, 0) {
            Ok(ObjectValue::Unsigned32(raw)) => CobId::from_raw(raw).can_id,
            _ => default_emcy_cob_id(id),
        }
    }

    /// Mirrors `EmcyManager::error_register` into Object 0x1001. This
    /// bypasses the normal access-flag-checked write path since 0x1001
    /// is read-only from the bus; only the stack itself updates it.
    fn sync_error_register(&mut self) {
        if let Some(entry) = self.dict.entry_mut(0x1001, 0) {
            entry.value = ObjectValue::Unsigned8(self.emcy.error_register());
        }
    }

    /// Brings the node onto the bus: initialises and enables the CAN
    /// and timer drivers, completes the boot sequence (Init ->
    /// Pre-Operational, emitting the bootup frame), and derives every
    /// timer-backed subsystem (heartbeat, SYNC, PDO event/inhibit
    /// timers) from the Object Dictionary's current configuration
    /// (spec.md Section 4.7, scenario 2).
    pub fn start(&mut self, baudrate: u32) -> Result<(), CanOpenError> {
        self.can.init()?;
        self.can.enable(baudrate)?;
        self.timer_driver.init(self.tick_freq_hz)?;
        self.timer_driver.start()?;
        self.nmt.finish_boot();
        self.emit_bootup_frame();
        self.reconfigure_heartbeat_producer();
        for sub in 1..=MAX_HEARTBEAT_CONSUMERS {
            self.reconfigure_heartbeat_consumer(0x1016, sub);
        }
        self.reconfigure_sync_producer();
        for ch in 0..self.rpdos.len() as u8 {
            self.rebuild_pdo_mapping(ch, PdoDirection::Receive);
        }
        for ch in 0..self.tpdos.len() as u8 {
            self.reconfigure_tpdo_inhibit(ch);
            self.rebuild_pdo_mapping(ch, PdoDirection::Transmit);
            self.reconfigure_tpdo_event_timer(ch);
        }
        Ok(())
    }

    /// One main-loop turn: drains every pending CAN frame, steps the
    /// timer wheel once if the hardware timer reports an elapsed
    /// period, and drains whatever actions that made elapsed (spec.md
    /// Section 5, "process drains queued work and returns").
    pub fn process(&mut self) -> Result<(), CanOpenError> {
        while let Some(frame) = self.can.receive()? {
            self.dispatch_frame(&frame);
        }
        if self.timer_driver.update()? {
            self.timers.service(1);
        }
        let mut fired = Vec::new();
        self.timers.process(|cb| fired.push(cb));
        for cb in fired {
            self.handle_timer_callback(cb);
        }
        Ok(())
    }

    // --- Frame dispatch ---

    fn dispatch_frame(&mut self, frame: &CanFrame) {
        if frame.id == 0x000 {
            self.handle_nmt_command(frame);
            return;
        }
        let allowed = self.nmt.allowed_messages();

        if frame.id == self.sync_can_id() {
            if allowed.allows(MessageCategory::Sync) {
                self.handle_sync_event();
            }
            return;
        }

        if let Some(slot) = self.heartbeat_consumer_slot_for(frame.id) {
            if allowed.allows(MessageCategory::Heartbeat) {
                self.handle_heartbeat_frame(slot, frame);
            }
            return;
        }

        if allowed.allows(MessageCategory::Sdo) {
            for i in 0..self.sdo_servers.len() {
                if self.sdo_servers[i].request_cob_id == frame.id {
                    self.handle_sdo_server_frame(i, frame);
                    return;
                }
            }
            #[cfg(feature = "sdo-client")]
            for i in 0..self.sdo_clients.len() {
                if self.sdo_clients[i].response_cob_id == frame.id {
                    self.handle_sdo_client_frame(i, frame);
                    return;
                }
            }
        }

        if allowed.allows(MessageCategory::Pdo) {
            for i in 0..self.rpdos.len() {
                let (cob_id, valid) = (self.rpdos[i].cob_id, self.rpdos[i].is_valid());
                if valid && CobId::from_raw(cob_id).can_id == frame.id {
                    self.handle_rpdo_frame(i, frame);
                    return;
                }
            }
        }
    }

    fn handle_nmt_command(&mut self, frame: &CanFrame) {
        let data = frame.payload();
        if data.len() < 2 {
            return;
        }
        let target = data[1];
        let id: u8 = self.node_id.into();
        if target != 0 && target != id {
            return;
        }
        let event = match data[0] {
            0x01 => NmtEvent::Start,
            0x02 => NmtEvent::Stop,
            0x80 => NmtEvent::EnterPreOperational,
            0x81 => NmtEvent::ResetNode,
            0x82 => NmtEvent::ResetCommunication,
            _ => return,
        };
        self.apply_nmt_event(event);
    }

    fn apply_nmt_event(&mut self, event: NmtEvent) {
        let transition = self.nmt.process(event);
        if let Some(scope) = transition.reset {
            self.run_reset_cascade(scope);
            self.nmt.finish_boot();
            self.emit_bootup_frame();
        }
        if transition.changed {
            if let Some(cb) = self.callbacks.as_mut() {
                cb.on_mode_change(self.nmt.state());
            }
        }
    }

    /// NMT command 0x81/0x82 (spec.md Section 4.7): stops every active
    /// timer this stack owns, resets SDO transfers in progress, and
    /// re-derives PDO/heartbeat/SYNC configuration from the (freshly
    /// restored, for a node reset) Object Dictionary.
    fn run_reset_cascade(&mut self, scope: ResetScope) {
        if matches!(scope, ResetScope::Node) {
            let _ = self.dict.restore_parameters();
        }

        if let Some(id) = self.heartbeat_producer_timer.take() {
            let _ = self.timers.cancel(id);
        }
        if let Some(id) = self.sync.producer_timer_id.take() {
            let _ = self.timers.cancel(id);
        }
        for t in self.tpdos.iter_mut() {
            if let Some(id) = t.event_timer_id.take() {
                let _ = self.timers.cancel(id);
            }
            if let Some(id) = t.inhibit_timer_id.take() {
                let _ = self.timers.cancel(id);
            }
            t.inhibit_active = false;
            t.event_pending = false;
        }
        let consumer_timer_ids: Vec<u32> = (0..MAX_HEARTBEAT_CONSUMERS as usize)
            .filter_map(|i| self.heartbeat_consumers.slot(i).and_then(|e| e.timer_id.take()))
            .collect();
        for id in consumer_timer_ids {
            let _ = self.timers.cancel(id);
        }

        for server in self.sdo_servers.iter_mut() {
            server.reset();
        }

        self.sync = SyncCoordinator::new();
        self.emcy = EmcyManager::new();

        self.reconfigure_heartbeat_producer();
        for sub in 1..=MAX_HEARTBEAT_CONSUMERS {
            self.reconfigure_heartbeat_consumer(0x1016, sub);
        }
        self.reconfigure_sync_producer();
        for ch in 0..self.rpdos.len() as u8 {
            self.reconfigure_pdo_cob_id(ch, PdoDirection::Receive);
            self.reconfigure_pdo_transmission_type(ch, PdoDirection::Receive);
            self.rebuild_pdo_mapping(ch, PdoDirection::Receive);
        }
        for ch in 0..self.tpdos.len() as u8 {
            self.reconfigure_pdo_cob_id(ch, PdoDirection::Transmit);
            self.reconfigure_pdo_transmission_type(ch, PdoDirection::Transmit);
            self.reconfigure_tpdo_inhibit(ch);
            self.rebuild_pdo_mapping(ch, PdoDirection::Transmit);
        }
    }

    fn emit_bootup_frame(&mut self) {
        let id: u8 = self.node_id.into();
        match CanFrame::new(default_heartbeat_cob_id(id), false, &[0x00]) {
            Ok(frame) => {
                if let Err(e) = self.can.send(&frame) {
                    self.last_error = Some(e);
                }
            }
            Err(e) => self.last_error = Some(e),
        }
    }

    fn sync_can_id(&self) -> u32 {
        match self.dict.read(0x1005, 0) {
            Ok(ObjectValue::Unsigned32(raw)) => CobId::from_raw(raw).can_id,
            _ => crate::types::C_COBID_SYNC_DEFAULT as u32,
        }
    }

    fn heartbeat_consumer_slot_for(&self, can_id: u32) -> Option<usize> {
        self.heartbeat_consumers.iter().position(|e| {
            e.is_monitored() && default_heartbeat_cob_id(u8::from(e.node_id)) == can_id
        })
    }

    // --- SDO ---

    fn handle_sdo_server_frame(&mut self, idx: usize, frame: &CanFrame) {
        let frames = self.sdo_servers[idx].handle_frame(frame, &mut self.dict);
        if let Some((index, sub_index)) = self.sdo_servers[idx].take_last_commit() {
            let kind = self
                .dict
                .entry(index, sub_index)
                .map(|e| e.kind)
                .unwrap_or(ObjectTypeKind::Plain);
            self.after_write(index, sub_index, kind);
        }
        for f in frames {
            if let Err(e) = self.can.send(&f) {
                self.last_error = Some(e);
            }
        }
    }

    #[cfg(feature = "sdo-client")]
    fn handle_sdo_client_frame(&mut self, idx: usize, frame: &CanFrame) {
        match self.sdo_clients[idx].handle_frame(frame) {
            SdoClientEvent::Continue(f) => self.send_sdo_client_continuation(idx, f),
            SdoClientEvent::Done(_) => {
                if let Some(id) = self.sdo_clients[idx].timer_id.take() {
                    let _ = self.timers.cancel(id);
                }
            }
            SdoClientEvent::Ignored => {}
        }
    }

    /// Sends the next frame of an in-flight SDO client transfer and
    /// rearms its timeout. Shared by normal segment continuation and by
    /// a timeout-triggered retry (spec.md Section 4.4 supplement).
    #[cfg(feature = "sdo-client")]
    fn send_sdo_client_continuation(&mut self, idx: usize, frame: CanFrame) {
        if let Some(id) = self.sdo_clients[idx].timer_id.take() {
            let _ = self.timers.cancel(id);
        }
        if let Err(e) = self.can.send(&frame) {
            self.last_error = Some(e);
        }
        let ticks = self.sdo_clients[idx].timeout_ticks.max(1);
        let id = self.timers.schedule(ticks, 0, TimerCallback::SdoClientTimeout);
        self.sdo_clients[idx].timer_id = Some(id);
    }

    // --- PDO ---

    fn handle_rpdo_frame(&mut self, ch: usize, frame: &CanFrame) {
        let was_synchronous = self.rpdos[ch].is_synchronous();
        if self.rpdos[ch].receive(frame.payload(), &mut self.dict).is_err() {
            return;
        }
        if was_synchronous {
            return;
        }
        let mapping = self.rpdos[ch].mapping.clone();
        self.run_on_change_triggers(&mapping);
    }

    /// Runs every object-change side effect (0x1001 register sync,
    /// timer rearm, mapping rebuild, mapping-link trigger) a Dictionary
    /// write requires (spec.md Section 4.2, per-type write-time
    /// preconditions and Section 4.5 "Object change").
    fn after_write(&mut self, index: u16, sub_index: u8, kind: ObjectTypeKind) {
        let async_trigger = self
            .dict
            .entry(index, sub_index)
            .map(|e| e.flags.async_trigger)
            .unwrap_or(false);
        if async_trigger {
            for ch in self.link_table.channels_for(index, sub_index) {
                let ch = ch as usize;
                self.tpdos[ch].event_pending = true;
                if matches!(
                    self.tpdos[ch].kind(),
                    TransmissionType::AsynchronousEvent | TransmissionType::AsynchronousManufacturer
                ) {
                    let _ = self.transmit_tpdo(ch);
                }
            }
        }

        match kind {
            ObjectTypeKind::Plain | ObjectTypeKind::ErrorHistory => {}
            ObjectTypeKind::ParaStore => {
                if let Err(e) = self.dict.store_parameters() {
                    self.last_error = Some(e);
                }
            }
            ObjectTypeKind::ParaRestore => {
                if let Err(e) = self.dict.restore_parameters() {
                    self.last_error = Some(e);
                }
            }
            ObjectTypeKind::HeartbeatProducerTime => self.reconfigure_heartbeat_producer(),
            ObjectTypeKind::HeartbeatConsumerEntry => {
                self.reconfigure_heartbeat_consumer(index, sub_index)
            }
            ObjectTypeKind::SyncCobId | ObjectTypeKind::SyncCyclePeriod => {
                self.reconfigure_sync_producer()
            }
            ObjectTypeKind::PdoCommCobId { channel, direction } => {
                self.reconfigure_pdo_cob_id(channel, direction)
            }
            ObjectTypeKind::PdoTransmissionType { channel, direction } => {
                self.reconfigure_pdo_transmission_type(channel, direction)
            }
            ObjectTypeKind::PdoInhibitTime { channel } => self.reconfigure_tpdo_inhibit(channel),
            ObjectTypeKind::PdoEventTimer { channel } => self.reconfigure_tpdo_event_timer(channel),
            ObjectTypeKind::PdoMappingNumber { channel, direction }
            | ObjectTypeKind::PdoMappingEntry { channel, direction } => {
                self.rebuild_pdo_mapping(channel, direction)
            }
        }
    }

    /// Re-runs the async on-change trigger for every object a mapping
    /// references, used after a buffered synchronous RPDO is applied
    /// (spec.md Section 4.9) since that write bypassed `write_object`.
    fn run_on_change_triggers(&mut self, mapping: &PdoMapping) {
        for (_, entry) in mapping.iter_with_offsets() {
            let kind = self
                .dict
                .entry(entry.index, entry.sub_index)
                .map(|e| e.kind)
                .unwrap_or(ObjectTypeKind::Plain);
            self.after_write(entry.index, entry.sub_index, kind);
        }
    }

    /// Sends one TPDO if the NMT state currently permits PDO traffic
    /// (spec.md Section 4.7: PDOs are only exchanged in Operational).
    /// Outside Operational this only updates `event_pending` so the
    /// transmission happens once the node reaches Operational instead
    /// of being silently dropped.
    fn transmit_tpdo(&mut self, ch: usize) -> Result<(), CanOpenError> {
        let (cob_id, valid, inhibited) = {
            let t = &self.tpdos[ch];
            (t.cob_id, t.is_valid(), t.inhibit_active)
        };
        if !valid {
            return Ok(());
        }
        if !self.nmt.allowed_messages().allows(MessageCategory::Pdo) {
            self.tpdos[ch].event_pending = true;
            return Ok(());
        }
        if inhibited {
            self.tpdos[ch].event_pending = true;
            return Ok(());
        }
        let (payload, len) = self.tpdos[ch]
            .build_payload(&self.dict)
            .map_err(CanOpenError::from)?;
        let can_id = CobId::from_raw(cob_id).can_id;
        let frame = CanFrame::new(can_id, false, &payload[..len as usize])?;
        self.can.send(&frame)?;
        self.tpdos[ch].event_pending = false;
        if self.tpdos[ch].has_inhibit() {
            let ticks = self.us_to_ticks(self.tpdos[ch].inhibit_time_100us as u32 * 100);
            let id = self
                .timers
                .schedule(ticks, 0, TimerCallback::PdoInhibitElapsed { channel: ch as u8 });
            self.tpdos[ch].inhibit_active = true;
            self.tpdos[ch].inhibit_timer_id = Some(id);
        }
        Ok(())
    }

    fn reconfigure_pdo_cob_id(&mut self, channel: u8, direction: PdoDirection) {
        let comm_index = match direction {
            PdoDirection::Receive => 0x1400 + channel as u16,
            PdoDirection::Transmit => 0x1800 + channel as u16,
        };
        let raw = match self.dict.read(comm_index, 1) {
            Ok(ObjectValue::Unsigned32(v)) => v,
            _ => return,
        };
        match direction {
            PdoDirection::Receive => {
                if let Some(r) = self.rpdos.get_mut(channel as usize) {
                    r.cob_id = raw;
                }
            }
            PdoDirection::Transmit => {
                if let Some(t) = self.tpdos.get_mut(channel as usize) {
                    t.cob_id = raw;
                }
            }
        }
    }

    fn reconfigure_pdo_transmission_type(&mut self, channel: u8, direction: PdoDirection) {
        let comm_index = match direction {
            PdoDirection::Receive => 0x1400 + channel as u16,
            PdoDirection::Transmit => 0x1800 + channel as u16,
        };
        let raw = match self.dict.read(comm_index, 2) {
            Ok(ObjectValue::Unsigned8(v)) => v,
            _ => return,
        };
        match direction {
            PdoDirection::Receive => {
                if let Some(r) = self.rpdos.get_mut(channel as usize) {
                    r.transmission_type = raw;
                }
            }
            PdoDirection::Transmit => {
                if let Some(t) = self.tpdos.get_mut(channel as usize) {
                    t.transmission_type = raw;
                }
                if let TransmissionType::SynchronousCyclic(n) = TransmissionType::from_raw(raw) {
                    self.sync.register_divisor(n);
                }
                self.reconfigure_tpdo_event_timer(channel);
            }
        }
    }

    fn reconfigure_tpdo_inhibit(&mut self, channel: u8) {
        let comm_index = 0x1800 + channel as u16;
        if let Ok(ObjectValue::Unsigned16(v)) = self.dict.read(comm_index, 3) {
            if let Some(t) = self.tpdos.get_mut(channel as usize) {
                t.inhibit_time_100us = v;
            }
        }
    }

    fn reconfigure_tpdo_event_timer(&mut self, channel: u8) {
        let ch = channel as usize;
        if let Some(id) = self.tpdos.get_mut(ch).and_then(|t| t.event_timer_id.take()) {
            let _ = self.timers.cancel(id);
        }
        let comm_index = 0x1800 + channel as u16;
        let period_ms = match self.dict.read(comm_index, 5) {
            Ok(ObjectValue::Unsigned16(v)) => v,
            _ => return,
        };
        if let Some(t) = self.tpdos.get_mut(ch) {
            t.event_timer_ms = period_ms;
        }
        let is_event_driven = self
            .tpdos
            .get(ch)
            .map(|t| {
                matches!(
                    t.kind(),
                    TransmissionType::AsynchronousEvent | TransmissionType::AsynchronousManufacturer
                )
            })
            .unwrap_or(false);
        if is_event_driven && period_ms > 0 {
            let ticks = self.ms_to_ticks(period_ms as u32);
            let id = self
                .timers
                .schedule(ticks, ticks, TimerCallback::PdoEventTimer { channel });
            if let Some(t) = self.tpdos.get_mut(ch) {
                t.event_timer_id = Some(id);
            }
        }
    }

    fn rebuild_pdo_mapping(&mut self, channel: u8, direction: PdoDirection) {
        let map_index = match direction {
            PdoDirection::Receive => 0x1600 + channel as u16,
            PdoDirection::Transmit => 0x1A00 + channel as u16,
        };
        let count = match self.dict.read(map_index, 0) {
            Ok(ObjectValue::Unsigned8(v)) => v,
            _ => 0,
        };
        let mut mapping = PdoMapping::new();
        for sub in 1..=count {
            if let Ok(ObjectValue::Unsigned32(raw)) = self.dict.read(map_index, sub) {
                mapping.set(sub - 1, PdoMappingEntry::from_u32(raw));
            }
        }
        mapping.set_len(count);
        match direction {
            PdoDirection::Receive => {
                if let Some(r) = self.rpdos.get_mut(channel as usize) {
                    r.mapping = mapping;
                }
            }
            PdoDirection::Transmit => {
                if let Some(t) = self.tpdos.get_mut(channel as usize) {
                    t.mapping = mapping.clone();
                }
                self.link_table.rebuild_channel(channel, &mapping);
            }
        }
    }

    // --- NMT / heartbeat / SYNC timer-backed reconfiguration ---

    fn reconfigure_heartbeat_producer(&mut self) {
        if let Some(id) = self.heartbeat_producer_timer.take() {
            let _ = self.timers.cancel(id);
        }
        if let Ok(ObjectValue::Unsigned16(period_ms)) = self.dict.read(0x1017, 0) {
            if period_ms > 0 {
                let ticks = self.ms_to_ticks(period_ms as u32);
                let id = self.timers.schedule(ticks, ticks, TimerCallback::HeartbeatProducer);
                self.heartbeat_producer_timer = Some(id);
            }
        }
    }

    fn reconfigure_heartbeat_consumer(&mut self, index: u16, sub_index: u8) {
        if index != 0x1016 || sub_index == 0 {
            return;
        }
        let raw = match self.dict.read(index, sub_index) {
            Ok(ObjectValue::Unsigned32(v)) => v,
            _ => return,
        };
        let (node_id, period_ms) = decode_consumer_entry(raw);
        let slot_idx = (sub_index - 1) as usize;
        let old_timer = self
            .heartbeat_consumers
            .slot(slot_idx)
            .and_then(|e| e.timer_id.take());
        if let Some(id) = old_timer {
            let _ = self.timers.cancel(id);
        }
        if period_ms > 0 {
            let ticks = self.ms_to_ticks(period_ms as u32);
            let id = self
                .timers
                .schedule(ticks, 0, TimerCallback::HeartbeatConsumer { index: slot_idx as u8 });
            if let Some(entry) = self.heartbeat_consumers.slot(slot_idx) {
                entry.node_id = node_id;
                entry.period_ms = period_ms;
                entry.last_state = None;
                entry.missed_count = 0;
                entry.timer_id = Some(id);
            }
        } else if let Some(entry) = self.heartbeat_consumers.slot(slot_idx) {
            entry.node_id = node_id;
            entry.period_ms = 0;
            entry.last_state = None;
            entry.missed_count = 0;
            entry.timer_id = None;
        }
    }

    fn reconfigure_sync_producer(&mut self) {
        let raw_cobid = match self.dict.read(0x1005, 0) {
            Ok(ObjectValue::Unsigned32(v)) => v,
            _ => return,
        };
        let cobid = CobId::from_raw(raw_cobid);
        self.sync.producer_enabled = cobid.service_flag && !cobid.invalid;
        self.sync.cycle_period_us = match self.dict.read(0x1006, 0) {
            Ok(ObjectValue::Unsigned32(v)) => v,
            _ => 0,
        };
        if let Some(id) = self.sync.producer_timer_id.take() {
            let _ = self.timers.cancel(id);
        }
        if self.sync.is_producer() {
            let ticks = self.us_to_ticks(self.sync.cycle_period_us);
            let id = self.timers.schedule(ticks, ticks, TimerCallback::SyncProducer);
            self.sync.producer_timer_id = Some(id);
        }
    }

    fn handle_sync_event(&mut self) {
        let tick = self.sync.on_sync();
        for i in 0..self.rpdos.len() {
            if self.rpdos[i].apply_buffered(&mut self.dict).is_ok() {
                let mapping = self.rpdos[i].mapping.clone();
                if !mapping.is_empty() {
                    self.run_on_change_triggers(&mapping);
                }
            }
        }
        let due: Vec<usize> = self
            .tpdos
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_valid() && t.kind().is_synchronous() && t.due_at_sync_count(tick.count))
            .map(|(i, _)| i)
            .collect();
        for ch in due {
            let _ = self.transmit_tpdo(ch);
        }
    }

    fn handle_heartbeat_frame(&mut self, slot: usize, frame: &CanFrame) {
        let payload = frame.payload();
        if payload.is_empty() {
            return;
        }
        let state = match payload[0] {
            0x04 => Some(NmtState::Stopped),
            0x05 => Some(NmtState::Operational),
            0x7F => Some(NmtState::PreOperational),
            _ => None,
        };
        let period_ms = {
            let entry = match self.heartbeat_consumers.slot(slot) {
                Some(e) => e,
                None => return,
            };
            if let Some(id) = entry.timer_id.take() {
                let _ = self.timers.cancel(id);
            }
            if let Some(new_state) = state {
                if entry.last_state != Some(new_state) {
                    my_debug!("[Node] heartbeat consumer {}: remote node changed state", slot);
                }
                entry.last_state = Some(new_state);
            }
            entry.period_ms
        };
        if period_ms > 0 {
            let ticks = self.ms_to_ticks(period_ms as u32);
            let id = self
                .timers
                .schedule(ticks, 0, TimerCallback::HeartbeatConsumer { index: slot as u8 });
            if let Some(entry) = self.heartbeat_consumers.slot(slot) {
                entry.timer_id = Some(id);
            }
        }
    }

    fn handle_timer_callback(&mut self, cb: TimerCallback) {
        match cb {
            TimerCallback::HeartbeatProducer => {
                let id: u8 = self.node_id.into();
                let byte = self.nmt.heartbeat_byte();
                if let Ok(frame) = CanFrame::new(default_heartbeat_cob_id(id), false, &[byte]) {
                    if let Err(e) = self.can.send(&frame) {
                        self.last_error = Some(e);
                    }
                }
            }
            TimerCallback::HeartbeatConsumer { index } => {
                if let Some(entry) = self.heartbeat_consumers.slot(index as usize) {
                    entry.missed_count = entry.missed_count.saturating_add(1);
                    entry.timer_id = None;
                    my_warn!("[Node] heartbeat consumer {}: guard time elapsed with no heartbeat", index);
                }
            }
            TimerCallback::SyncProducer => {
                let sync_can_id = self.sync_can_id();
                if let Ok(frame) = CanFrame::new(sync_can_id, false, &[]) {
                    if let Err(e) = self.can.send(&frame) {
                        self.last_error = Some(e);
                    }
                }
                self.handle_sync_event();
            }
            TimerCallback::PdoEventTimer { channel } => {
                let _ = self.transmit_tpdo(channel as usize);
            }
            TimerCallback::PdoInhibitElapsed { channel } => {
                let ch = channel as usize;
                if let Some(t) = self.tpdos.get_mut(ch) {
                    t.inhibit_active = false;
                    t.inhibit_timer_id = None;
                }
                if self.tpdos.get(ch).map(|t| t.event_pending).unwrap_or(false) {
                    let _ = self.transmit_tpdo(ch);
                }
            }
            TimerCallback::SdoServerTimeout => {
                for server in self.sdo_servers.iter_mut() {
                    if !server.is_idle() {
                        server.reset();
                    }
                }
            }
            TimerCallback::SdoClientTimeout => {
                // Like `SdoServerTimeout`, this callback carries no
                // channel index, so every non-idle client is polled;
                // only the one whose timer actually elapsed is not
                // idle and produces an event.
                #[cfg(feature = "sdo-client")]
                for idx in 0..self.sdo_clients.len() {
                    if self.sdo_clients[idx].is_idle() {
                        continue;
                    }
                    match self.sdo_clients[idx].on_timeout() {
                        SdoClientEvent::Continue(frame) => {
                            self.send_sdo_client_continuation(idx, frame)
                        }
                        SdoClientEvent::Done(_) => {
                            if let Some(id) = self.sdo_clients[idx].timer_id.take() {
                                let _ = self.timers.cancel(id);
                            }
                        }
                        SdoClientEvent::Ignored => {}
                    }
                }
            }
        }
    }

    fn ms_to_ticks(&self, ms: u32) -> u32 {
        (((ms as u64) * self.tick_freq_hz as u64) / 1000).max(1) as u32
    }

    fn us_to_ticks(&self, us: u32) -> u32 {
        (((us as u64) * self.tick_freq_hz as u64) / 1_000_000).max(1) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::od::{AccessFlags, ObjectEntry};
    use alloc::vec::Vec as StdVec;
    use core::convert::TryFrom;

    struct MockCan {
        inbox: StdVec<CanFrame>,
        sent: StdVec<CanFrame>,
    }

    impl MockCan {
        fn new() -> Self {
            Self {
                inbox: StdVec::new(),
                sent: StdVec::new(),
            }
        }
    }

    impl CanInterface for MockCan {
        fn init(&mut self) -> Result<(), CanOpenError> {
            Ok(())
        }
        fn enable(&mut self, _baudrate: u32) -> Result<(), CanOpenError> {
            Ok(())
        }
        fn send(&mut self, frame: &CanFrame) -> Result<(), CanOpenError> {
            self.sent.push(*frame);
            Ok(())
        }
        fn receive(&mut self) -> Result<Option<CanFrame>, CanOpenError> {
            Ok(if self.inbox.is_empty() {
                None
            } else {
                Some(self.inbox.remove(0))
            })
        }
        fn reset(&mut self) -> Result<(), CanOpenError> {
            Ok(())
        }
        fn close(&mut self) -> Result<(), CanOpenError> {
            Ok(())
        }
    }

    struct MockTimer;
    impl TimerInterface for MockTimer {
        fn init(&mut self, _freq_hz: u32) -> Result<(), CanOpenError> {
            Ok(())
        }
        fn reload(&mut self, _ticks: u32) -> Result<(), CanOpenError> {
            Ok(())
        }
        fn delay(&mut self) -> Result<u32, CanOpenError> {
            Ok(0)
        }
        fn stop(&mut self) -> Result<(), CanOpenError> {
            Ok(())
        }
        fn start(&mut self) -> Result<(), CanOpenError> {
            Ok(())
        }
        fn update(&mut self) -> Result<bool, CanOpenError> {
            Ok(false)
        }
    }

    fn node_id() -> NodeId {
        NodeId::try_from(1u8).unwrap()
    }

    #[test]
    fn start_boots_to_pre_operational_and_emits_bootup_frame() {
        let mut can = MockCan::new();
        let mut timer = MockTimer;
        let mut node = Node::new(node_id(), &mut can, &mut timer, None, 1000);
        node.start(125_000).unwrap();
        assert_eq!(node.nmt_state(), NmtState::PreOperational);
        assert_eq!(can.sent.len(), 1);
        assert_eq!(can.sent[0].id, 0x701);
        assert_eq!(can.sent[0].payload(), &[0x00]);
    }

    #[test]
    fn nmt_start_command_enters_operational() {
        let mut can = MockCan::new();
        let mut timer = MockTimer;
        let mut node = Node::new(node_id(), &mut can, &mut timer, None, 1000);
        node.start(125_000).unwrap();
        can.inbox.push(CanFrame::new(0x000, false, &[0x01, 0x01]).unwrap());
        node.process().unwrap();
        assert_eq!(node.nmt_state(), NmtState::Operational);
    }

    #[test]
    fn expedited_sdo_download_writes_object_and_responds() {
        let mut can = MockCan::new();
        let mut timer = MockTimer;
        let mut node = Node::new(node_id(), &mut can, &mut timer, None, 1000);
        node.dictionary_mut().insert(ObjectEntry::scalar(
            0x2000,
            0,
            ObjectValue::Unsigned16(0),
            AccessFlags::RW,
        ));
        node.start(125_000).unwrap();
        can.sent.clear();

        let request = CanFrame::new(0x601, false, &[0x2B, 0x00, 0x20, 0x00, 0x34, 0x12]).unwrap();
        can.inbox.push(request);
        node.process().unwrap();

        assert_eq!(node.read_object(0x2000, 0).unwrap(), ObjectValue::Unsigned16(0x1234));
        assert_eq!(can.sent.len(), 1);
        assert_eq!(can.sent[0].id, 0x581);
        assert_eq!(can.sent[0].payload()[0], 0x60);
    }

    #[test]
    fn tpdo_on_change_respects_inhibit() {
        let mut can = MockCan::new();
        let mut timer = MockTimer;
        let mut node = Node::new(node_id(), &mut can, &mut timer, None, 1000);
        node.dictionary_mut().insert(ObjectEntry::scalar(
            0x2000,
            0,
            ObjectValue::Unsigned16(0),
            AccessFlags::RW.rw_async(),
        ));
        node.add_tpdo(0);
        node.write_object(0x1A00, 1, ObjectValue::Unsigned32(0x2000_00_10)).unwrap();
        node.write_object(0x1A00, 0, ObjectValue::Unsigned8(1)).unwrap();
        node.write_object(0x1800, 3, ObjectValue::Unsigned16(100)).unwrap(); // 10ms inhibit
        node.start(125_000).unwrap();
        can.inbox.push(CanFrame::new(0x000, false, &[0x01, 0x01]).unwrap());
        node.process().unwrap();
        assert_eq!(node.nmt_state(), NmtState::Operational);
        can.sent.clear();

        node.write_object(0x2000, 0, ObjectValue::Unsigned16(0xAAAA)).unwrap();
        assert_eq!(can.sent.len(), 1);
        assert_eq!(can.sent[0].payload(), &[0xAA, 0xAA]);

        node.write_object(0x2000, 0, ObjectValue::Unsigned16(0xBBBB)).unwrap();
        assert_eq!(can.sent.len(), 1, "inhibited TPDO must not transmit immediately");
    }
}
