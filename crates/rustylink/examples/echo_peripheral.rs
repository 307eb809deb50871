use rustylink::transport::WriteParams;
use rustylink::{
    BdAddr, ClientConfig, ConnHandle, Peripheral, PeripheralConfig, SimTransport, TransportEvent,
};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    // Bring the stack up against the simulated transport
    let mut peripheral = Peripheral::new(SimTransport::new(), PeripheralConfig::default())?;
    peripheral.on_command(|command| println!("Command received: {}", hex::encode(command)));

    println!("Starting stack...");
    peripheral.init()?;
    peripheral.poll()?;
    println!("State: {}", peripheral.state());

    // A central connects, enables notifications and sends a few commands
    let handles = peripheral.config().handles;
    let conn = ConnHandle::new(1, 0);
    let sim = peripheral.transport_mut();
    sim.connect(conn.bd_handle, conn.att_id, BdAddr::new([0x5A, 0x4B, 0x3C, 0x2D, 0x1E, 0x0F]));
    sim.push_event(TransportEvent::MtuExchangeRequested { conn, mtu: 64 });
    sim.push_event(TransportEvent::WriteRequest(WriteParams::new(
        conn,
        handles.response_cccd,
        ClientConfig::NOTIFY.to_cccd(),
    )));

    let commands: [&[u8]; 3] = [b"hello", b"ping", &[0xA5; 80]];
    for command in commands {
        peripheral
            .transport_mut()
            .push_event(TransportEvent::WriteCommand(WriteParams::new(
                conn,
                handles.command,
                command,
            )));

        peripheral.poll()?;
        println!(
            "State: {}, MTU: {}",
            peripheral.state(),
            peripheral.current_negotiated_mtu()
        );

        // Echo the pending command back
        if let Some(command) = peripheral.take_command() {
            let delivered = peripheral.send_response_fast(&command)?;
            println!("Echoed {} of {} bytes", delivered, command.len());
        }
    }

    println!("Central disconnects...");
    peripheral.transport_mut().disconnect(0x13);
    peripheral.poll()?;
    peripheral.poll()?;
    println!(
        "State: {}, MTU: {}",
        peripheral.state(),
        peripheral.current_negotiated_mtu()
    );

    println!("Stopping stack...");
    peripheral.stop()?;
    println!("State: {}", peripheral.state());

    Ok(())
}
