use crate::batching::CommandBatcher;
use crate::config::ClientConfig;
use crate::game::ClientGame;
use crate::input::InputSource;
use crate::latency::DelayLine;
use crate::render::RenderSink;
use crate::stats::{PingTracker, UpdateRateMeter};
use log::{debug, error, info, warn};
use shared::{
    decode_packet, read_frame, step_secs, write_packet, MonotonicClock, Packet, ProtocolError,
};
use std::io;
use std::time::{Duration, Instant};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};

const JOIN_TIMEOUT: Duration = Duration::from_secs(5);
const RENDER_INTERVAL: Duration = Duration::from_millis(16);

/// Why the run loop stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum Exit {
    /// The configured run time elapsed.
    Finished,
    ServerClosed,
}

/// Headless client: samples input, predicts, talks to the server and renders.
pub struct Client {
    config: ClientConfig,
    game: ClientGame,
    input: Box<dyn InputSource + Send>,
    renderer: Box<dyn RenderSink + Send>,

    writer: OwnedWriteHalf,
    incoming_rx: mpsc::UnboundedReceiver<Packet>,

    outgoing: DelayLine<Packet>,
    incoming: DelayLine<Packet>,
    batcher: CommandBatcher,
    ping: PingTracker,
    update_rate: UpdateRateMeter,
    /// Local time base for ping origins and the server clock estimate.
    clock: MonotonicClock,
    commands_sent: u64,
}

impl Client {
    /// Connects and waits for the join ack.
    pub async fn connect(
        config: ClientConfig,
        input: Box<dyn InputSource + Send>,
        renderer: Box<dyn RenderSink + Send>,
    ) -> Result<Self, ProtocolError> {
        info!("Connecting to {}...", config.server_addr);
        let stream = TcpStream::connect(&config.server_addr).await?;
        stream.set_nodelay(true)?;
        let (mut reader, writer) = stream.into_split();

        let clock = MonotonicClock::new();
        let mut game = ClientGame::new(&config);
        match timeout(JOIN_TIMEOUT, Self::read_packet(&mut reader)).await {
            Ok(Ok(Some(Packet::JoinAck {
                connection_id,
                tick_rate,
                movement_policy,
                snapshot,
            }))) => {
                game.join(
                    connection_id,
                    tick_rate,
                    movement_policy,
                    snapshot,
                    clock.now_ms(),
                );
            }
            Ok(Ok(Some(Packet::Rejected { reason }))) => {
                return Err(io::Error::new(io::ErrorKind::ConnectionRefused, reason).into());
            }
            Ok(Ok(Some(other))) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("expected join ack, got {}", other.kind()),
                )
                .into());
            }
            Ok(Ok(None)) => {
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "no join ack").into());
            }
        }

        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        tokio::spawn(Self::read_loop(reader, incoming_tx));

        let now = Instant::now();
        Ok(Client {
            outgoing: DelayLine::new(config.fake_ping),
            incoming: DelayLine::new(config.fake_ping),
            batcher: CommandBatcher::new(config.send_interval),
            ping: PingTracker::new(),
            update_rate: UpdateRateMeter::new(now),
            clock,
            commands_sent: 0,
            game,
            input,
            renderer,
            writer,
            incoming_rx,
            config,
        })
    }

    async fn read_packet(reader: &mut OwnedReadHalf) -> Result<Option<Packet>, ProtocolError> {
        match read_frame(reader).await? {
            Some(payload) => decode_packet(&payload).map(Some),
            None => Ok(None),
        }
    }

    async fn read_loop(mut reader: OwnedReadHalf, incoming_tx: mpsc::UnboundedSender<Packet>) {
        loop {
            match read_frame(&mut reader).await {
                Ok(Some(payload)) => match decode_packet(&payload) {
                    Ok(packet) => {
                        if incoming_tx.send(packet).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Dropped malformed message from server: {}", e),
                },
                Ok(None) => {
                    info!("Server closed the connection");
                    break;
                }
                Err(e) => {
                    error!("Connection error: {}", e);
                    break;
                }
            }
        }
    }

    /// Main client loop.
    pub async fn run(&mut self) -> Result<Exit, ProtocolError> {
        let tick_rate = self.game.tick_rate();
        let tick_period = Duration::from_secs_f32(step_secs(tick_rate));

        let mut sim_interval = interval(tick_period);
        sim_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut render_interval = interval(RENDER_INTERVAL);
        render_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let deadline = self.config.run_for.map(|d| tokio::time::Instant::now() + d);
        let run_until = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(run_until);

        let mut server_open = true;
        info!("Running at {} Hz", tick_rate);

        let exit = loop {
            tokio::select! {
                packet = self.incoming_rx.recv(), if server_open => {
                    match packet {
                        Some(packet) => self.incoming.push(packet, Instant::now()),
                        None => server_open = false,
                    }
                }

                _ = sim_interval.tick() => {
                    if let Some(exit) = self.tick().await? {
                        break exit;
                    }
                    if !server_open && self.incoming.is_empty() {
                        break Exit::ServerClosed;
                    }
                }

                _ = render_interval.tick() => {
                    let frame = self.game.render_frame(self.clock.now_ms());
                    self.renderer.render(&frame);
                }

                _ = &mut run_until => {
                    break Exit::Finished;
                }
            }
        };

        if exit == Exit::Finished {
            self.disconnect().await;
        }

        info!(
            "Client stopped ({:?}): {} commands sent, ping {:?} ms, {:.1} updates/s",
            exit,
            self.commands_sent,
            self.ping.latest(),
            self.update_rate.rate()
        );
        Ok(exit)
    }

    /// One fixed step: deliver due packets, sample input, send.
    async fn tick(&mut self) -> Result<Option<Exit>, ProtocolError> {
        let now = Instant::now();

        for packet in self.incoming.drain_due(now) {
            if let Some(exit) = self.handle_packet(packet, now) {
                return Ok(Some(exit));
            }
        }

        let sample = self.input.sample(self.game.tick());
        if let Some(command) = self.game.process_input(sample) {
            self.batcher.push(command);
        }
        if let Some(update) = self.batcher.poll(now) {
            if let Packet::ClientUpdate { commands } = &update {
                self.commands_sent += commands.len() as u64;
            }
            self.outgoing.push(update, now);
        }
        if let Some(ping) = self.ping.poll(now, self.clock.now_ms()) {
            self.outgoing.push(ping, now);
        }

        for packet in self.outgoing.drain_due(now) {
            write_packet(&mut self.writer, &packet).await?;
        }
        Ok(None)
    }

    fn handle_packet(&mut self, packet: Packet, now: Instant) -> Option<Exit> {
        match packet {
            Packet::ServerUpdate { snapshot } => {
                self.update_rate.record(now);
                let rtt = self.ping.latest().unwrap_or(0);
                self.game.apply_snapshot(snapshot, rtt, self.clock.now_ms());
            }

            Packet::Ping { origin_timestamp } => {
                let rtt = self.ping.record_echo(origin_timestamp, self.clock.now_ms(), now);
                debug!("Ping: {} ms", rtt);
            }

            Packet::Disconnect => {
                info!("Server is shutting down");
                return Some(Exit::ServerClosed);
            }

            other => {
                warn!("Unexpected {} packet from server", other.kind());
            }
        }
        None
    }

    async fn disconnect(&mut self) {
        let now = Instant::now();
        let mut final_packets: Vec<Packet> = self.batcher.flush(now).into_iter().collect();
        final_packets.push(Packet::Disconnect);

        for packet in final_packets {
            if let Err(e) = write_packet(&mut self.writer, &packet).await {
                debug!("Failed to send {} on exit: {}", packet.kind(), e);
                return;
            }
        }
    }

    pub fn game(&self) -> &ClientGame {
        &self.game
    }

    pub fn ping(&self) -> &PingTracker {
        &self.ping
    }

    pub fn update_rate(&self) -> f32 {
        self.update_rate.rate()
    }

    pub fn commands_sent(&self) -> u64 {
        self.commands_sent
    }
}
