//! End-to-end session tests over loopback
//!
//! Each test runs real non-blocking UDP sockets on ephemeral ports. Tests
//! that exercise discovery pin a distinct discovery port each so they can run
//! in parallel, and point the broadcast address at loopback.

use std::cell::RefCell;
use std::net::{Ipv4Addr, SocketAddr};
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use lanlink::network::{
    Session, SessionCallbacks, SessionConfig, SessionState, SocketKind, UdpTransport, MAX_PLAYERS,
};
use lanlink::protocol::{MessageCodec, MessageType};

fn config(discovery_port: u16) -> SessionConfig {
    SessionConfig {
        discovery_port,
        broadcast_addr: Ipv4Addr::LOCALHOST,
        ..SessionConfig::default()
    }
}

fn host_addr(session: &Session) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, session.local_port()))
}

/// Test: a client joins a hosted session
/// Given A hosts "Test"
/// When B joins A's address and both update
/// Then B is Connected and A has one registered player
#[test]
fn test_join_reaches_connected() {
    let mut host = Session::new(config(0));
    let mut client = Session::new(config(0));

    host.host_game("Test", 0).unwrap();
    client
        .join_game("127.0.0.1", host.local_port(), "Bob")
        .unwrap();
    assert_eq!(client.state(), SessionState::Connecting);

    for _ in 0..200 {
        host.update();
        client.update();
        if client.state() == SessionState::Connected {
            break;
        }
        thread::sleep(Duration::from_millis(2));
    }

    assert_eq!(client.state(), SessionState::Connected);
    assert_eq!(host.player_count(), 1);

    let player = &host.players()[0];
    assert_eq!(player.name, "Bob");
    assert_eq!(player.id, client.local_player_id());
    assert!(player.connected);
}

/// Test: chat is attributed to the sender
/// Given B has joined A's session
/// When B sends "hi"
/// Then A's chat observer fires with B's id and the text
#[test]
fn test_chat_attribution() {
    let mut host = Session::new(config(0));
    let mut client = Session::new(config(0));

    let received: Rc<RefCell<Vec<(u32, String)>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = received.clone();
    host.set_callbacks(SessionCallbacks {
        on_chat: Some(Box::new(move |id, text| {
            sink.borrow_mut().push((id, text.to_string()));
        })),
        ..SessionCallbacks::default()
    });

    host.host_game("Test", 0).unwrap();
    client
        .join_game("127.0.0.1", host.local_port(), "Bob")
        .unwrap();

    for _ in 0..200 {
        host.update();
        client.update();
        if client.state() == SessionState::Connected {
            break;
        }
        thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(client.state(), SessionState::Connected);

    assert_eq!(client.send_chat("hi").unwrap(), 1);

    for _ in 0..200 {
        host.update();
        if !received.borrow().is_empty() {
            break;
        }
        thread::sleep(Duration::from_millis(2));
    }

    let messages = received.borrow();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0], (client.local_player_id(), "hi".to_string()));
}

/// Test: the host's join observer fires with the accepted name
#[test]
fn test_player_joined_observer() {
    let mut host = Session::new(config(0));
    let mut client = Session::new(config(0));

    let joined: Rc<RefCell<Vec<(u32, String)>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = joined.clone();
    host.set_callbacks(SessionCallbacks {
        on_player_joined: Some(Box::new(move |id, name| {
            sink.borrow_mut().push((id, name.to_string()));
        })),
        ..SessionCallbacks::default()
    });

    host.host_game("Test", 0).unwrap();
    client
        .join_game("127.0.0.1", host.local_port(), "Alice")
        .unwrap();

    for _ in 0..200 {
        host.update();
        client.update();
        if !joined.borrow().is_empty() {
            break;
        }
        thread::sleep(Duration::from_millis(2));
    }

    let events = joined.borrow();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].1, "Alice");
    assert_eq!(events[0].0, host.players()[0].id);
}

/// Test: LAN discovery lists a hosted game
/// Given A hosts "Test" on a pinned discovery port
/// When C starts discovery against loopback and both update
/// Then C's game list has exactly one entry named "Test"
#[test]
fn test_discovery_lists_hosted_game() {
    let mut host = Session::new(config(47911));
    let mut browser = Session::new(config(47911));

    host.host_game("Test", 0).unwrap();
    browser.start_discovery().unwrap();

    for _ in 0..300 {
        host.update();
        browser.update();
        if !browser.discovered_games(16).is_empty() {
            break;
        }
        thread::sleep(Duration::from_millis(2));
    }

    let games = browser.discovered_games(16);
    assert_eq!(games.len(), 1);
    assert_eq!(games[0].info.name, "Test");
    assert_eq!(games[0].info.host_port, host.local_port());
    assert_eq!(games[0].info.game_id, host.game_id());
    assert_eq!(games[0].info.max_players, MAX_PLAYERS as u8);
}

/// Test: repeated discovery responses stay deduplicated
/// Given a browser that has already seen a host
/// When further responses for the same game id arrive
/// Then the list still has one entry, reflecting the latest counts
#[test]
fn test_discovery_dedupes_by_game_id() {
    let mut host = Session::new(config(47913));
    let mut browser = Session::new(config(47913));

    host.host_game("Dedup", 0).unwrap();
    browser.start_discovery().unwrap();

    // The browser re-broadcasts every second; run long enough to get
    // several responses for the same game id.
    for _ in 0..40 {
        host.update();
        browser.update();
        thread::sleep(Duration::from_millis(5));
    }
    browser.broadcast_discovery().unwrap();
    for _ in 0..40 {
        host.update();
        browser.update();
        thread::sleep(Duration::from_millis(5));
    }

    assert_eq!(browser.discovered_games(16).len(), 1);
}

/// Test: joins past capacity are silently rejected
/// Given a full session of eight players
/// When a ninth client asks to join
/// Then it never connects and the registry stays at eight
#[test]
fn test_join_rejected_when_full() {
    let mut host = Session::new(config(0));
    host.host_game("Full", 0).unwrap();
    let port = host.local_port();

    let mut clients: Vec<Session> = (0..MAX_PLAYERS)
        .map(|i| {
            let mut c = Session::new(config(0));
            c.join_game("127.0.0.1", port, &format!("p{i}")).unwrap();
            c
        })
        .collect();

    for _ in 0..300 {
        host.update();
        for c in clients.iter_mut() {
            c.update();
        }
        if host.player_count() == MAX_PLAYERS {
            break;
        }
        thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(host.player_count(), MAX_PLAYERS);

    let mut late = Session::new(config(0));
    late.join_game("127.0.0.1", port, "late").unwrap();
    for _ in 0..50 {
        host.update();
        late.update();
        thread::sleep(Duration::from_millis(2));
    }

    assert_eq!(late.state(), SessionState::Connecting);
    assert_eq!(host.player_count(), MAX_PLAYERS);
}

/// Test: a retransmitted join request does not register twice
#[test]
fn test_duplicate_join_request_registers_once() {
    let mut host = Session::new(config(0));
    host.host_game("Test", 0).unwrap();

    let raw = UdpTransport::bind(SocketKind::Session, 0).unwrap();
    let mut codec = MessageCodec::new();
    let dest = host_addr(&host);

    for _ in 0..2 {
        let datagram = codec.encode(MessageType::JoinRequest, b"Bob").unwrap();
        raw.send_to(&datagram, dest).unwrap();
        for _ in 0..50 {
            host.update();
            thread::sleep(Duration::from_millis(2));
        }
    }

    assert_eq!(host.player_count(), 1);
}

/// Test: an explicit disconnect removes the player and fires the observer
#[test]
fn test_client_disconnect_removes_player() {
    let mut host = Session::new(config(0));
    let mut client = Session::new(config(0));

    let left: Rc<RefCell<Vec<u32>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = left.clone();
    host.set_callbacks(SessionCallbacks {
        on_player_left: Some(Box::new(move |id| sink.borrow_mut().push(id))),
        ..SessionCallbacks::default()
    });

    host.host_game("Test", 0).unwrap();
    client
        .join_game("127.0.0.1", host.local_port(), "Bob")
        .unwrap();

    for _ in 0..200 {
        host.update();
        client.update();
        if client.state() == SessionState::Connected {
            break;
        }
        thread::sleep(Duration::from_millis(2));
    }
    let bob = client.local_player_id();

    client.disconnect();
    for _ in 0..200 {
        host.update();
        if host.player_count() == 0 {
            break;
        }
        thread::sleep(Duration::from_millis(2));
    }

    assert_eq!(host.player_count(), 0);
    assert_eq!(*left.borrow(), vec![bob]);
}

/// Test: a silent player is swept out after the liveness timeout
#[test]
fn test_silent_player_is_swept() {
    let mut cfg = config(0);
    cfg.player_timeout = Duration::from_millis(100);
    let mut host = Session::new(cfg);
    let mut client = Session::new(config(0));

    host.host_game("Test", 0).unwrap();
    client
        .join_game("127.0.0.1", host.local_port(), "Bob")
        .unwrap();

    for _ in 0..200 {
        host.update();
        client.update();
        if host.player_count() == 1 {
            break;
        }
        thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(host.player_count(), 1);

    // The client goes silent without disconnecting
    thread::sleep(Duration::from_millis(150));
    host.update();
    assert_eq!(host.player_count(), 0);
}

/// Test: garbage datagrams are discarded and counted, never fatal
#[test]
fn test_malformed_datagrams_are_counted_not_fatal() {
    let mut host = Session::new(config(0));
    host.host_game("Test", 0).unwrap();
    let dest = host_addr(&host);

    let raw = UdpTransport::bind(SocketKind::Session, 0).unwrap();
    raw.send_to(b"not a lanlink datagram", dest).unwrap();
    raw.send_to(&[0u8; 3], dest).unwrap();

    for _ in 0..100 {
        host.update();
        if host.statistics().errors >= 2 {
            break;
        }
        thread::sleep(Duration::from_millis(2));
    }

    assert_eq!(host.state(), SessionState::Hosting);
    assert_eq!(host.statistics().errors, 2);
    assert_eq!(host.statistics().messages_received, 0);
}

/// Test: game data reaches the application callback untouched
#[test]
fn test_game_data_forwarded_opaque() {
    let mut host = Session::new(config(0));
    let mut client = Session::new(config(0));

    let received: Rc<RefCell<Vec<(u32, Vec<u8>)>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = received.clone();
    host.set_callbacks(SessionCallbacks {
        on_game_data: Some(Box::new(move |id, data| {
            sink.borrow_mut().push((id, data.to_vec()));
        })),
        ..SessionCallbacks::default()
    });

    host.host_game("Test", 0).unwrap();
    client
        .join_game("127.0.0.1", host.local_port(), "Bob")
        .unwrap();
    for _ in 0..200 {
        host.update();
        client.update();
        if client.state() == SessionState::Connected {
            break;
        }
        thread::sleep(Duration::from_millis(2));
    }

    let payload = vec![0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x42];
    client.send_to_all(MessageType::GameData, &payload).unwrap();

    for _ in 0..200 {
        host.update();
        if !received.borrow().is_empty() {
            break;
        }
        thread::sleep(Duration::from_millis(2));
    }

    let events = received.borrow();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0], (client.local_player_id(), payload));
}

/// Test: statistics count traffic on both ends
#[test]
fn test_statistics_accumulate() {
    let mut host = Session::new(config(0));
    let mut client = Session::new(config(0));

    host.host_game("Test", 0).unwrap();
    client
        .join_game("127.0.0.1", host.local_port(), "Bob")
        .unwrap();

    for _ in 0..200 {
        host.update();
        client.update();
        if client.state() == SessionState::Connected {
            break;
        }
        thread::sleep(Duration::from_millis(2));
    }

    // Client sent the join request; host sent the response; both received one
    let c = client.statistics();
    assert!(c.messages_sent >= 1);
    assert!(c.messages_received >= 1);
    assert!(c.bytes_sent > 0);

    let h = host.statistics();
    assert!(h.messages_received >= 1);
    assert!(h.messages_sent >= 1);
    assert_eq!(h.errors, 0);
}
