// Scripted instrument on loopback sockets for tests.
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};

use crate::connection::{Role, SessionConnection};
use crate::proto::codec::encode_command;
use crate::session::DeviceSession;

/// Instrument side of one loopback connection.
pub struct FakePeer {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl FakePeer {
    /// Read `n` lines sent by the client.
    pub fn recv(&mut self, n: usize) -> Vec<String> {
        (0..n)
            .map(|_| {
                let mut line = String::new();
                self.reader.read_line(&mut line).unwrap();
                line.trim_end_matches('\n').to_string()
            })
            .collect()
    }

    /// Read a command and assert its lines.
    pub fn expect(&mut self, lines: &[&str]) {
        assert_eq!(self.recv(lines.len()), lines);
    }

    pub fn reply(&mut self, line: &str) {
        self.writer
            .write_all(encode_command(&[line]).as_bytes())
            .unwrap();
    }

    pub fn send_i32s(&mut self, values: &[i32]) {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.writer.write_all(&bytes).unwrap();
    }

    pub fn send_i16s(&mut self, values: &[i16]) {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.writer.write_all(&bytes).unwrap();
    }
}

pub fn fake_pair(role: Role) -> (SessionConnection, FakePeer) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
    let (server, _) = listener.accept().unwrap();
    let peer = FakePeer {
        reader: BufReader::new(server.try_clone().unwrap()),
        writer: server,
    };
    (SessionConnection::from_stream(role, client).unwrap(), peer)
}

/// Fresh session in the `Disconnected` state plus the control and data peers.
pub fn fake_session() -> (DeviceSession, FakePeer, FakePeer) {
    let (control, control_peer) = fake_pair(Role::Control);
    let (data, data_peer) = fake_pair(Role::Data);
    let mut session = DeviceSession::new(control, 0);
    session.attach_data(data);
    (session, control_peer, data_peer)
}

/// Session past handshake and acquireDevice, with the replies queued up front.
pub fn fake_acquired_session() -> (DeviceSession, FakePeer, FakePeer) {
    let (mut s, mut ctl, data) = fake_session();
    ctl.reply("hello from ROSY");
    ctl.reply("welcome");
    ctl.reply("0");
    s.handshake().unwrap();
    s.acquire_device().unwrap();
    ctl.expect(&["hello", "version 1.0", "function acquireDevice", "0"]);
    (s, ctl, data)
}
