//! Packet encoding integration tests against the public API

use robolink::drive::{DEFAULT_BOUND, DriveMix};
use robolink::protocol::{Component, Index, Operation, PacketEncoder, PacketIds, Receiver, Transmitter};

#[test]
fn test_motor_speed_packet() {
    let encoder = PacketEncoder::new();
    let packet = encoder.motor_speed_command(
        Transmitter::Master,
        Receiver::All,
        Component::Drive,
        [50, -50, 50, -50, 50, -50],
    );
    assert_eq!(packet, "001XA!AA[50:-50:50:-50:50:-50]");
}

#[test]
fn test_read_packet() {
    let encoder = PacketEncoder::new();
    let packet = encoder.read_command(
        Transmitter::Master,
        Receiver::ControllerBoard,
        Component::Arm,
        Index::Slot3,
        7,
    );
    assert_eq!(packet, "001XC?C3[7]");
}

#[test]
fn test_ids_advance_per_packet_and_wrap() {
    let encoder = PacketEncoder::with_ids(PacketIds::starting_at(998));
    let ids: Vec<String> = (0..4)
        .map(|_| {
            encoder.encode(
                Transmitter::ControllerBoard,
                Receiver::MainBoard,
                Operation::Message,
                Component::Power,
                Index::All,
                &[],
            )[..3]
                .to_string()
        })
        .collect();
    assert_eq!(ids, vec!["998", "999", "001", "002"]);
}

#[test]
fn test_stick_to_packet() {
    let encoder = PacketEncoder::new();
    let mix = DriveMix::from_stick(100, 0, DEFAULT_BOUND);
    let packet = encoder.motor_speed_command(Transmitter::Master, Receiver::All, Component::Drive, mix.motor_speeds());
    assert_eq!(packet, "001XA!AA[100:100:100:-100:-100:-100]");
}

#[test]
fn test_field_names_parse() {
    assert_eq!("pan_tilt".parse::<Component>().unwrap(), Component::PanTilt);
    assert_eq!("Main-Board".parse::<Receiver>().unwrap(), Receiver::MainBoard);
    assert_eq!("answer".parse::<Operation>().unwrap().code(), '^');
    assert!("slot7".parse::<Index>().is_err());
}
