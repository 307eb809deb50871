//! Unit tests for the peripheral against the simulated transport

use super::*;
use crate::att::{AttErrorCode, ATT_DEFAULT_MTU};
use crate::diag::{Diagnostics, QueuedDiagnostics};
use crate::error::LinkError;
use crate::gap::{AddressType, BdAddr, ConnHandle};
use crate::gatt::ServiceHandles;
use crate::smp::{AuthError, AuthInfo, SecurityLevel, SecurityMode};
use crate::transport::sim::Call;
use crate::transport::{
    ConnectionInfo, DisconnectInfo, GapOps, GattServerOps, Phy, SimTransport, StackState,
    TransportEvent, WriteParams,
};
use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

const PEER: BdAddr = BdAddr {
    bytes: [0x10, 0x20, 0x30, 0x40, 0x50, 0x60],
};
const CONN: ConnHandle = ConnHandle {
    bd_handle: 1,
    att_id: 0,
};

type TestPeripheral = Peripheral<SimTransport, QueuedDiagnostics>;

/// A peripheral whose stack is on and advertising
fn started(config: PeripheralConfig) -> TestPeripheral {
    let mut peripheral =
        Peripheral::with_diagnostics(SimTransport::new(), QueuedDiagnostics::new(), config)
            .unwrap();
    peripheral.init().unwrap();
    peripheral.poll().unwrap();
    peripheral
}

/// A started peripheral with a central connected
fn connected(config: PeripheralConfig) -> TestPeripheral {
    let mut peripheral = started(config);
    peripheral
        .transport_mut()
        .connect(CONN.bd_handle, CONN.att_id, PEER);
    peripheral.poll().unwrap();
    peripheral
}

fn write_request(peripheral: &mut TestPeripheral, handle: u16, value: &[u8]) {
    peripheral
        .transport_mut()
        .push_event(TransportEvent::WriteRequest(WriteParams::new(CONN, handle, value)));
    peripheral.poll().unwrap();
}

fn enable_notifications(peripheral: &mut TestPeripheral) {
    let cccd = peripheral.config().handles.response_cccd;
    write_request(peripheral, cccd, &[0x01, 0x00]);
}

fn peer_auth(level: SecurityLevel) -> AuthInfo {
    AuthInfo {
        bd_handle: CONN.bd_handle,
        mode: SecurityMode::Mode1,
        level,
        bonding: true,
        key_size: 16,
        error: AuthError::None,
    }
}

fn count(peripheral: &TestPeripheral, pred: impl Fn(&Call) -> bool) -> usize {
    peripheral.transport().count_calls(pred)
}

#[test]
fn test_stack_on_starts_advertising_and_generates_keys() {
    let peripheral = started(PeripheralConfig::default());
    assert_eq!(peripheral.state(), LinkState::Advertising);
    assert_eq!(
        count(&peripheral, |c| matches!(c, Call::StartAdvertising(..))),
        1
    );
    assert!(peripheral.session().keys().is_some());
    assert!(peripheral.session().addresses().is_some());

    let calls = peripheral.transport().calls();
    let public = peripheral.session().addresses().unwrap().public;
    assert!(calls.contains(&Call::SetIdentityAddress(public)));
    assert!(calls.contains(&Call::SetDefaultPhy(Phy::Le2M, Phy::Le2M)));
}

#[test]
fn test_phy_update_is_a_capability() {
    let peripheral = started(PeripheralConfig {
        phy_update: false,
        ..PeripheralConfig::default()
    });
    assert_eq!(count(&peripheral, |c| matches!(c, Call::SetDefaultPhy(..))), 0);
}

#[test]
fn test_connect_requests_auth_and_provisions_new_peer() {
    let peripheral = connected(PeripheralConfig::default());
    assert_eq!(peripheral.state(), LinkState::Authenticating);
    assert_eq!(peripheral.session().connection(), Some(CONN));
    assert_eq!(count(&peripheral, |c| matches!(c, Call::AuthRequest(_))), 1);
    assert_eq!(
        count(&peripheral, |c| *c == Call::SetSecurityKeys(CONN.bd_handle)),
        1
    );
}

#[test]
fn test_bonded_peer_keeps_its_keys() {
    let mut peripheral = started(PeripheralConfig::default());
    peripheral
        .transport_mut()
        .add_bond(PEER, AddressType::Public, CONN.bd_handle);
    peripheral
        .transport_mut()
        .connect(CONN.bd_handle, CONN.att_id, PEER);
    peripheral.poll().unwrap();

    assert_eq!(count(&peripheral, |c| matches!(c, Call::SetSecurityKeys(_))), 0);
    assert_eq!(count(&peripheral, |c| matches!(c, Call::AuthRequest(_))), 1);
}

#[test]
fn test_open_peripheral_skips_auth_but_provisions() {
    let mut peripheral = started(PeripheralConfig::open());
    // Bonds are invisible when bonding is disabled
    peripheral
        .transport_mut()
        .add_bond(PEER, AddressType::Public, CONN.bd_handle);
    peripheral
        .transport_mut()
        .connect(CONN.bd_handle, CONN.att_id, PEER);
    peripheral.poll().unwrap();

    assert_eq!(peripheral.state(), LinkState::Connected);
    assert_eq!(count(&peripheral, |c| matches!(c, Call::AuthRequest(_))), 0);
    assert_eq!(
        count(&peripheral, |c| *c == Call::SetSecurityKeys(CONN.bd_handle)),
        1
    );
}

#[test]
fn test_command_buffer_through_dispatcher() {
    let mut peripheral = connected(PeripheralConfig::default());
    let command = peripheral.config().handles.command;

    write_request(&mut peripheral, command, &[0x01, 0x02]);
    assert_eq!(peripheral.pending_command(), Some(&[0x01, 0x02][..]));

    write_request(&mut peripheral, command, &[0x03]);
    assert_eq!(peripheral.pending_command(), Some(&[0x01, 0x02][..]));
    assert_eq!(
        count(&peripheral, |c| matches!(c, Call::WriteResponse(_))),
        2
    );

    assert_eq!(peripheral.take_command(), Some(vec![0x01, 0x02]));
    assert_eq!(peripheral.pending_command(), None);
}

#[test]
fn test_command_callback_runs_on_stored_commands() {
    let mut peripheral = connected(PeripheralConfig::default());
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    peripheral.on_command(move |value| sink.borrow_mut().push(value.to_vec()));

    let command = peripheral.config().handles.command;
    write_request(&mut peripheral, command, &[0x07]);
    write_request(&mut peripheral, command, &[]);

    peripheral.transport_mut().fail_attribute_writes = Some(AttErrorCode::WriteNotPermitted);
    write_request(&mut peripheral, command, &[0x08]);

    assert_eq!(*seen.borrow(), vec![vec![0x07]]);
    assert_eq!(
        count(&peripheral, |c| matches!(c, Call::ErrorResponse { .. })),
        1
    );
}

#[test]
fn test_fast_response_truncates_to_mtu() {
    let mut peripheral = connected(PeripheralConfig::default());
    enable_notifications(&mut peripheral);
    assert_eq!(peripheral.current_negotiated_mtu(), ATT_DEFAULT_MTU);

    let payload: Vec<u8> = (0..200).map(|i| i as u8).collect();
    assert_eq!(peripheral.send_response_fast(&payload), Ok(20));

    let sent = peripheral.transport().notifications();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0], payload[..20].to_vec());
}

#[test]
fn test_fast_response_preconditions() {
    let mut peripheral = started(PeripheralConfig::default());
    assert_eq!(
        peripheral.send_response_fast(&[1]),
        Err(LinkError::NoConnection)
    );

    peripheral
        .transport_mut()
        .connect(CONN.bd_handle, CONN.att_id, PEER);
    peripheral.poll().unwrap();
    assert_eq!(
        peripheral.send_response_fast(&[1]),
        Err(LinkError::NotificationDisabled)
    );
}

#[test]
fn test_fast_response_waits_for_idle() {
    let mut peripheral = connected(PeripheralConfig {
        busy_wait: PollBudget::spins(10),
        ..PeripheralConfig::default()
    });
    enable_notifications(&mut peripheral);

    peripheral.transport_mut().set_busy_for(4);
    assert_eq!(peripheral.send_response_fast(&[1, 2, 3]), Ok(3));
    assert!(!peripheral.transport().is_busy(CONN));
    assert_eq!(peripheral.transport().notifications(), vec![vec![1, 2, 3]]);
}

#[test]
fn test_fast_response_times_out_on_stuck_transport() {
    let mut peripheral = connected(PeripheralConfig {
        busy_wait: PollBudget::spins(5),
        ..PeripheralConfig::default()
    });
    enable_notifications(&mut peripheral);

    peripheral.transport_mut().set_stuck_busy(true);
    assert_eq!(peripheral.send_response_fast(&[1]), Err(LinkError::Timeout));
    assert!(peripheral.transport().notifications().is_empty());
}

#[test]
fn test_fast_response_tolerates_disconnect_while_waiting() {
    let mut peripheral = connected(PeripheralConfig::default());
    enable_notifications(&mut peripheral);

    let sim = peripheral.transport_mut();
    sim.set_busy_for(3);
    sim.push_event(TransportEvent::DeviceDisconnected(DisconnectInfo {
        bd_handle: CONN.bd_handle,
        reason: 0x13,
        status: 0,
    }));
    sim.push_event(TransportEvent::GattDisconnected(CONN));

    assert_eq!(
        peripheral.send_response_fast(&[1]),
        Err(LinkError::NoConnection)
    );
    assert!(peripheral.transport().notifications().is_empty());
    assert_eq!(peripheral.session().connection(), None);
}

#[test]
fn test_reliable_response() {
    let mut peripheral = connected(PeripheralConfig::default());
    assert_eq!(
        peripheral.send_response_reliable(&[1]),
        Err(LinkError::IndicationDisabled)
    );

    let response = peripheral.config().handles.response;
    peripheral
        .transport_mut()
        .push_event(TransportEvent::IndicationEnabled {
            conn: CONN,
            handle: response,
        });
    peripheral
        .transport_mut()
        .push_event(TransportEvent::MtuExchangeRequested {
            conn: CONN,
            mtu: 100,
        });
    peripheral.poll().unwrap();

    assert!(matches!(
        peripheral.send_response_reliable(&[]),
        Err(LinkError::InvalidParameter(_))
    ));
    assert_eq!(peripheral.send_response_reliable(&[0xEE; 300]), Ok(97));
    assert_eq!(peripheral.transport().indications()[0].len(), 97);

    // The confirmation is consumed without side effects
    peripheral.poll().unwrap();
    assert_eq!(peripheral.transport().pending_events(), 0);
}

#[test]
fn test_mtu_is_negotiated_once_and_reset_on_disconnect() {
    let mut peripheral = connected(PeripheralConfig {
        max_mtu: 247,
        ..PeripheralConfig::default()
    });
    for mtu in [512, 100] {
        peripheral
            .transport_mut()
            .push_event(TransportEvent::MtuExchangeRequested { conn: CONN, mtu });
    }
    peripheral.poll().unwrap();
    assert_eq!(peripheral.current_negotiated_mtu(), 247);

    peripheral.transport_mut().disconnect(0x13);
    peripheral.poll().unwrap();
    assert_eq!(peripheral.current_negotiated_mtu(), ATT_DEFAULT_MTU);
}

#[test]
fn test_disconnect_restarts_advertising_once() {
    let mut peripheral = connected(PeripheralConfig::default());
    peripheral.transport_mut().clear_calls();

    peripheral.transport_mut().disconnect(0x13);
    peripheral.poll().unwrap();
    assert_eq!(peripheral.state(), LinkState::Disconnecting);

    peripheral.poll().unwrap();
    peripheral.poll().unwrap();
    assert_eq!(peripheral.state(), LinkState::Advertising);
    assert_eq!(
        count(&peripheral, |c| matches!(c, Call::StartAdvertising(..))),
        1
    );
}

#[test]
fn test_auth_reply_evicts_oldest_bond_and_retries() {
    let mut peripheral = connected(PeripheralConfig::default());
    let sim = peripheral.transport_mut();
    sim.add_bond(BdAddr::new([1; 6]), AddressType::Public, 5);
    sim.add_bond(BdAddr::new([2; 6]), AddressType::Public, 6);
    sim.fail_auth_replies = 1;
    sim.clear_calls();

    let result =
        peripheral.handle_event(TransportEvent::AuthRequested(peer_auth(SecurityLevel::Unauthenticated)));
    assert_eq!(result, Ok(()));

    let calls = peripheral.transport().calls();
    assert!(matches!(calls[0], Call::AuthReply(_)));
    assert_eq!(calls[1], Call::RemoveOldestBonded);
    assert!(matches!(calls[2], Call::AuthReply(_)));
    assert_eq!(calls.len(), 3);
    assert!(!peripheral.bonds().contains(peripheral.transport(), 5).unwrap());
}

#[test]
fn test_auth_reply_retries_only_once() {
    let mut peripheral = connected(PeripheralConfig::default());
    let sim = peripheral.transport_mut();
    sim.add_bond(BdAddr::new([1; 6]), AddressType::Public, 5);
    sim.fail_auth_replies = 2;
    sim.clear_calls();

    let result =
        peripheral.handle_event(TransportEvent::AuthRequested(peer_auth(SecurityLevel::Unauthenticated)));
    assert!(matches!(result, Err(LinkError::Transport(_))));
    assert_eq!(count(&peripheral, |c| matches!(c, Call::AuthReply(_))), 2);

    // The peripheral keeps running
    peripheral.poll().unwrap();
}

#[test]
fn test_auth_reply_policy() {
    let mut peripheral = connected(PeripheralConfig {
        security: crate::smp::SecurityConfig {
            level: SecurityLevel::Authenticated,
            ..Default::default()
        },
        ..PeripheralConfig::default()
    });
    peripheral.transport_mut().clear_calls();
    peripheral
        .handle_event(TransportEvent::AuthRequested(peer_auth(SecurityLevel::Unauthenticated)))
        .unwrap();
    match peripheral.transport().calls() {
        [Call::AuthReply(reply)] => {
            assert_eq!(reply.error, AuthError::AuthenticationRequirements)
        }
        other => panic!("unexpected calls {:?}", other),
    }
}

#[test]
fn test_open_peripheral_refuses_pairing() {
    let mut peripheral = connected(PeripheralConfig::open());
    peripheral.transport_mut().clear_calls();
    peripheral
        .handle_event(TransportEvent::AuthRequested(peer_auth(SecurityLevel::Unauthenticated)))
        .unwrap();
    match peripheral.transport().calls() {
        [Call::AuthReply(reply)] => assert_eq!(reply.error, AuthError::PairingNotSupported),
        other => panic!("unexpected calls {:?}", other),
    }
}

#[test]
fn test_auth_failure_is_recorded() {
    let mut peripheral = connected(PeripheralConfig::default());
    let mut failed = peer_auth(SecurityLevel::Unauthenticated);
    failed.error = AuthError::ConfirmValueMismatch;
    peripheral
        .transport_mut()
        .push_event(TransportEvent::AuthFailed(failed));
    peripheral.poll().unwrap();

    assert_eq!(peripheral.state(), LinkState::Connected);
    assert_eq!(
        peripheral.session().security().last_error(),
        AuthError::ConfirmValueMismatch
    );
    // The link stays up
    assert_eq!(peripheral.session().connection(), Some(CONN));
}

#[test]
fn test_bonding_data_waits_for_diagnostics() {
    let mut peripheral = connected(PeripheralConfig::default());
    peripheral.diagnostics_mut().queue(2);
    peripheral
        .transport_mut()
        .push_event(TransportEvent::PendingFlashWrite);

    peripheral.poll().unwrap();
    assert!(peripheral.session().persist_pending());
    assert_eq!(count(&peripheral, |c| *c == Call::StoreBondingData), 0);

    peripheral.diagnostics_mut().tick();
    peripheral.diagnostics_mut().tick();
    peripheral.poll().unwrap();
    peripheral.poll().unwrap();
    assert!(!peripheral.session().persist_pending());
    assert_eq!(count(&peripheral, |c| *c == Call::StoreBondingData), 1);
}

#[test]
fn test_bonding_data_store_is_retried() {
    let mut peripheral = connected(PeripheralConfig::default());
    peripheral.transport_mut().fail_bond_stores = 1;
    peripheral
        .transport_mut()
        .push_event(TransportEvent::PendingFlashWrite);

    peripheral.poll().unwrap();
    assert!(peripheral.session().persist_pending());
    peripheral.poll().unwrap();
    assert!(!peripheral.session().persist_pending());
    assert_eq!(count(&peripheral, |c| *c == Call::StoreBondingData), 2);
}

#[test]
fn test_failed_advertising_restart_still_persists_bonds() {
    let mut peripheral = connected(PeripheralConfig::default());
    let sim = peripheral.transport_mut();
    sim.disconnect(0x13);
    sim.fail_advertising = true;
    sim.push_event(TransportEvent::PendingFlashWrite);
    sim.clear_calls();

    for _ in 0..3 {
        assert_eq!(peripheral.poll(), Ok(()));
    }
    assert!(!peripheral.session().persist_pending());
    assert_eq!(count(&peripheral, |c| *c == Call::StoreBondingData), 1);
    assert_eq!(
        count(&peripheral, |c| matches!(c, Call::StartAdvertising(..))),
        3
    );
    assert_eq!(peripheral.state(), LinkState::Disconnecting);

    peripheral.transport_mut().fail_advertising = false;
    peripheral.poll().unwrap();
    peripheral.poll().unwrap();
    assert_eq!(peripheral.state(), LinkState::Advertising);
}

#[test]
fn test_second_link_is_refused() {
    let mut peripheral = connected(PeripheralConfig::default());
    peripheral.transport_mut().clear_calls();
    let state = peripheral.state();

    let newcomer = ConnectionInfo {
        status: 0,
        bd_handle: 5,
        peer_address: BdAddr::new([0x99; 6]),
        peer_address_type: AddressType::Public,
        interval: 6,
        latency: 0,
        supervision_timeout: 100,
        enhanced: false,
    };
    assert_eq!(
        peripheral.handle_event(TransportEvent::DeviceConnected(newcomer)),
        Err(LinkError::InvalidState)
    );

    assert_eq!(peripheral.state(), state);
    assert_eq!(peripheral.session().connection(), Some(CONN));
    assert_eq!(peripheral.session().peer().map(|p| p.bd_handle), Some(CONN.bd_handle));
    assert!(peripheral.transport().calls().is_empty());
}

#[test]
fn test_low_power_waits_for_diagnostics() {
    let mut peripheral = started(PeripheralConfig {
        low_power: true,
        ..PeripheralConfig::default()
    });
    peripheral.transport_mut().clear_calls();
    peripheral.diagnostics_mut().queue(1);
    peripheral.poll().unwrap();
    assert_eq!(count(&peripheral, |c| *c == Call::EnterLowPower), 0);

    peripheral.diagnostics_mut().tick();
    peripheral.poll().unwrap();
    assert_eq!(count(&peripheral, |c| *c == Call::EnterLowPower), 1);
}

#[test]
fn test_hardware_fault_latches() {
    let mut peripheral = connected(PeripheralConfig::default());
    enable_notifications(&mut peripheral);
    peripheral
        .transport_mut()
        .push_event(TransportEvent::HardwareError);

    assert_eq!(peripheral.poll(), Err(LinkError::HardwareFault));
    assert_eq!(peripheral.state(), LinkState::Faulted);
    assert_eq!(peripheral.poll(), Err(LinkError::HardwareFault));
    assert_eq!(
        peripheral.send_response_fast(&[1]),
        Err(LinkError::HardwareFault)
    );
    assert_eq!(
        peripheral.request_connection_param_update(6, 12, 0, 100),
        Err(LinkError::HardwareFault)
    );
}

#[test]
fn test_connection_param_update() {
    let mut peripheral = started(PeripheralConfig::default());
    assert_eq!(
        peripheral.request_connection_param_update(6, 12, 0, 100),
        Err(LinkError::NoConnection)
    );

    peripheral
        .transport_mut()
        .connect(CONN.bd_handle, CONN.att_id, PEER);
    peripheral.poll().unwrap();
    peripheral.transport_mut().clear_calls();

    assert!(matches!(
        peripheral.request_connection_param_update(5, 12, 0, 100),
        Err(LinkError::InvalidParameter(_))
    ));
    assert!(peripheral.transport().calls().is_empty());

    peripheral
        .request_connection_param_update(6, 12, 4, 100)
        .unwrap();
    match peripheral.transport().calls() {
        [Call::ConnParamUpdate(params)] => {
            assert_eq!(params.bd_handle, CONN.bd_handle);
            assert_eq!(params.latency, 4);
        }
        other => panic!("unexpected calls {:?}", other),
    }
}

#[test]
fn test_stop_waits_for_stack_and_flushes() {
    let mut peripheral = connected(PeripheralConfig::default());
    peripheral.diagnostics_mut().queue(3);
    peripheral.stop().unwrap();

    assert_eq!(peripheral.state(), LinkState::StackOff);
    assert_eq!(peripheral.transport().stack_state(), StackState::Stopped);
    assert_eq!(peripheral.diagnostics().flushes(), 1);
    assert!(peripheral.diagnostics().is_drained());
}

#[test]
fn test_clear_bonds() {
    let mut peripheral = started(PeripheralConfig::default());
    for handle in 1..=3 {
        peripheral
            .transport_mut()
            .add_bond(BdAddr::new([handle; 6]), AddressType::Public, handle);
    }
    peripheral.clear_bonds().unwrap();
    for handle in 1..=3 {
        assert!(!peripheral
            .bonds()
            .contains(peripheral.transport(), handle)
            .unwrap());
    }
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = PeripheralConfig {
        handles: ServiceHandles {
            command: 1,
            response: 1,
            response_cccd: 2,
        },
        ..PeripheralConfig::default()
    };
    assert!(matches!(
        Peripheral::new(SimTransport::new(), config),
        Err(LinkError::InvalidParameter(_))
    ));
}

proptest! {
    #[test]
    fn out_of_range_param_updates_never_reach_transport(
        interval_min in 0u16..=4000,
        interval_max in 0u16..=4000,
        latency in 0u16..=1000,
        timeout in 0u16..=4000,
    ) {
        let in_range = (6..=3200).contains(&interval_min)
            && (6..=3200).contains(&interval_max)
            && latency <= 500
            && (10..=3200).contains(&timeout);
        prop_assume!(!in_range);

        let mut peripheral = connected(PeripheralConfig::default());
        peripheral.transport_mut().clear_calls();
        let result =
            peripheral.request_connection_param_update(interval_min, interval_max, latency, timeout);
        prop_assert!(matches!(result, Err(LinkError::InvalidParameter(_))));
        prop_assert!(peripheral.transport().calls().is_empty());
    }

    #[test]
    fn disconnect_always_resets_mtu(peer_mtu in 0u16..=u16::MAX) {
        let mut peripheral = connected(PeripheralConfig::default());
        peripheral
            .transport_mut()
            .push_event(TransportEvent::MtuExchangeRequested { conn: CONN, mtu: peer_mtu });
        peripheral.poll().unwrap();
        prop_assert!(peripheral.current_negotiated_mtu() >= ATT_DEFAULT_MTU);

        peripheral.transport_mut().disconnect(0x08);
        peripheral.poll().unwrap();
        prop_assert_eq!(peripheral.current_negotiated_mtu(), ATT_DEFAULT_MTU);
    }
}
