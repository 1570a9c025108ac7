use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wlan_sme::command::{
    AddSessionRequest, ConnectRequest, DisconnectRequest, HwMode, HwModeRequest, KeyRequest,
    ScanRequest, TdlsAction, TdlsRequest,
};
use wlan_sme::{
    CommandPayload, LoopbackConfig, LoopbackRadio, RecoveryAction, Scheduler, SchedulerConfig,
    Ticket, TimeoutMonitor,
};
use wlan_sme_shared::{reason, CommandKind, MacAddr, SessionId, SessionMode};

const STATION: SessionId = SessionId(0);
const SOFT_AP: SessionId = SessionId(1);
const P2P: SessionId = SessionId(2);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = SchedulerConfig {
        active_timeout: Duration::from_secs(2),
        monitor_interval: Duration::from_millis(500),
        ..Default::default()
    };

    // TDLS never completes, so the monitor has something to catch
    let (radio, completions) = LoopbackRadio::new(LoopbackConfig {
        stall: vec![CommandKind::TdlsOp],
        ..Default::default()
    });
    let radio = Arc::new(radio);

    let scheduler = Arc::new(Scheduler::new(config, radio.clone())?);
    let _pump = scheduler.spawn_completion_pump(completions);
    info!("Scheduler started in front of the loopback radio");

    scheduler
        .register_session(STATION, SessionMode::Station, MacAddr([2, 0, 0, 0, 0, 1]))
        .await;

    // Create timeout monitor
    let monitor = Arc::new(TimeoutMonitor::new(scheduler.clone()));
    let monitor_handle = monitor.start_monitoring().await?;
    info!("Timeout monitor started");

    // Spawn recovery action handler
    let monitor_clone = monitor.clone();
    let scheduler_clone = scheduler.clone();
    let recovery_task = tokio::spawn(async move {
        handle_recovery_actions(monitor_clone, scheduler_clone).await
    });

    let producers = vec![
        tokio::spawn(station_producer(scheduler.clone())),
        tokio::spawn(soft_ap_producer(scheduler.clone())),
        tokio::spawn(scan_producer(scheduler.clone())),
    ];
    for result in join_all(producers).await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Producer failed: {}", e),
            Err(e) => error!("Producer task panicked: {}", e),
        }
    }

    // Give the monitor time to catch the stalled TDLS setup
    let recovery = tokio::time::timeout(Duration::from_secs(5), recovery_task).await;

    scheduler.dump_queue_status().await;
    let stats = scheduler.self_recovery_stats().await;
    info!(
        "Self-recovery ring: {} of {} entries ({} recorded)",
        stats.entries.len(),
        stats.capacity,
        stats.total_recorded
    );

    monitor_handle.stop().await;
    scheduler.shutdown().await?;
    scheduler.audit().await?;

    match recovery {
        Ok(Ok(Err(fault))) => Err(fault),
        _ => Ok(()),
    }
}

/// React to escalations until the first one has been handled
async fn handle_recovery_actions(
    monitor: Arc<TimeoutMonitor>,
    scheduler: Arc<Scheduler>,
) -> anyhow::Result<()> {
    while let Some(action) = monitor.recv_action().await {
        match action {
            RecoveryAction::SelfRecovery {
                handle,
                kind,
                session,
                elapsed,
            } => {
                warn!(
                    "Self-recovery: {} {} on {} wedged for {:?}",
                    handle, kind, session, elapsed
                );
                scheduler.purge("lower layer wedged").await?;
                return Ok(());
            }
            RecoveryAction::Fatal(fault) => {
                error!("Fatal: {}", fault);
                return Err(fault.into());
            }
        }
    }
    Ok(())
}

async fn report(label: &str, ticket: Ticket) {
    match ticket.completion.await {
        Ok(outcome) => info!(
            "{}: {} {} -> {:?} after {:?}",
            label, outcome.kind, outcome.session, outcome.status, outcome.elapsed
        ),
        Err(_) => warn!("{}: scheduler dropped the command", label),
    }
}

async fn station_producer(scheduler: Arc<Scheduler>) -> anyhow::Result<()> {
    let connect = scheduler
        .enqueue(
            STATION,
            CommandPayload::Connect(ConnectRequest {
                ssid: "lab-net".into(),
                bssid: None,
                channel: 36,
                secured: true,
            }),
            false,
        )
        .await?;
    report("station connect", connect).await;

    // Key installs jump the queue so the handshake is not stuck behind others
    let key = scheduler
        .enqueue(
            STATION,
            CommandPayload::SetKey(KeyRequest {
                key_index: 0,
                pairwise: true,
                peer: MacAddr([2, 0, 0, 0, 0, 0xaa]),
                key: vec![0x5a; 16],
                completes_handshake: true,
            }),
            true,
        )
        .await?;
    report("station set-key", key).await;

    let tdls = scheduler
        .enqueue(
            STATION,
            CommandPayload::TdlsOp(TdlsRequest {
                peer: MacAddr([2, 0, 0, 0, 0, 0xbb]),
                action: TdlsAction::Setup,
            }),
            false,
        )
        .await?;
    info!("station tdls setup queued as {} ({:?})", tdls.handle, tdls.disposition);
    report("station tdls", tdls).await;

    let disconnect = scheduler
        .enqueue(
            STATION,
            CommandPayload::Disconnect(DisconnectRequest {
                reason: reason::DEAUTH_LEAVING,
            }),
            false,
        )
        .await?;
    report("station disconnect", disconnect).await;
    Ok(())
}

async fn soft_ap_producer(scheduler: Arc<Scheduler>) -> anyhow::Result<()> {
    let add = scheduler
        .enqueue(
            SOFT_AP,
            CommandPayload::AddSession(AddSessionRequest {
                mode: SessionMode::SoftAp,
                mac: MacAddr([2, 0, 0, 0, 1, 1]),
            }),
            false,
        )
        .await?;
    report("soft-ap add", add).await;

    let hw_mode = scheduler
        .enqueue(
            SOFT_AP,
            CommandPayload::HwModeChange(HwModeRequest {
                mode: HwMode::DualMacDbs,
            }),
            false,
        )
        .await?;
    report("soft-ap hw-mode", hw_mode).await;

    let delete = scheduler
        .enqueue(SOFT_AP, CommandPayload::DeleteSession, false)
        .await?;
    report("soft-ap delete", delete).await;
    Ok(())
}

async fn scan_producer(scheduler: Arc<Scheduler>) -> anyhow::Result<()> {
    let mut tickets = Vec::new();
    for session in [STATION, P2P, STATION] {
        let ticket = scheduler
            .enqueue(
                session,
                CommandPayload::Scan(ScanRequest {
                    ssids: vec!["lab-net".into()],
                    channels: vec![1, 6, 11],
                    passive: false,
                    dwell_time_ms: 40,
                }),
                false,
            )
            .await?;
        tickets.push(report("scan", ticket));
    }
    join_all(tickets).await;
    Ok(())
}
