use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
mod config;
mod error;
mod events;
mod mappings;
mod services;
mod utils;

use config::Config;
use services::{create_host, FocusLock};

#[derive(Parser, Debug)]
#[command(name = "focus-lock")]
#[command(about = "Возвращает фокус окну, в котором вы печатали, если другое окно пытается его перехватить")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "focus-lock.toml")]
    config: String,

    /// Режим сухого запуска (эмуляция событий вместо системных хуков)
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования (переопределяет секцию [logging])
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Загрузка конфигурации
    let config = Arc::new(Config::load(&args.config)?);

    // Инициализация системы логирования
    init_tracing(&config, args.log_level.as_deref())?;

    info!("Запуск FocusLock v{}", env!("CARGO_PKG_VERSION"));
    info!("Конфигурация загружена из: {}", args.config);

    if args.dry_run {
        warn!("Режим сухого запуска - системные перехватчики не устанавливаются");
    }

    let host = create_host(&config, args.dry_run)?;
    let focus_lock = FocusLock::new(config.clone(), host.clone());

    info!("Все компоненты инициализированы");

    // Хуки устанавливаются и снимаются на том же потоке, который крутит цикл событий
    let (started_tx, started_rx) = oneshot::channel();
    let (finished_tx, finished_rx) = oneshot::channel::<()>();
    let pump_host = host.clone();
    let hook_thread = std::thread::Builder::new()
        .name("focus-lock-hooks".to_string())
        .spawn(move || {
            if let Err(e) = focus_lock.start() {
                let _ = started_tx.send(Err(e));
                return;
            }
            let _ = started_tx.send(Ok(()));

            if let Err(e) = pump_host.pump() {
                error!("Ошибка в цикле событий: {}", e);
            }

            focus_lock.stop();
            let _ = finished_tx.send(());
        })
        .context("Не удалось запустить поток перехватчиков")?;

    match started_rx.await {
        Ok(Ok(())) => info!("Все сервисы запущены"),
        Ok(Err(e)) => {
            error!("Не удалось запустить FocusLock: {}", e);
            if e.is_fatal() {
                error!("Повторный запуск не поможет без изменения конфигурации или прав");
            }
            let _ = hook_thread.join();
            return Err(e.into());
        }
        Err(_) => anyhow::bail!("Поток перехватчиков завершился до запуска сервисов"),
    }

    // Ожидание сигнала завершения
    tokio::select! {
        result = signal::ctrl_c() => match result {
            Ok(()) => info!("Получен сигнал завершения (Ctrl+C)"),
            Err(err) => error!("Ошибка при ожидании сигнала завершения: {}", err),
        },
        _ = finished_rx => warn!("Цикл событий завершился без сигнала остановки"),
    }

    info!("Завершение работы...");
    host.quit();

    // Ожидаем снятия хуков (с таймаутом)
    let shutdown_timeout = tokio::time::Duration::from_secs(5);
    let join = tokio::task::spawn_blocking(move || hook_thread.join());
    match tokio::time::timeout(shutdown_timeout, join).await {
        Ok(Ok(Ok(()))) => info!("Все сервисы завершили работу корректно"),
        Ok(_) => warn!("Поток перехватчиков завершился аварийно"),
        Err(_) => warn!("Таймаут при завершении сервисов"),
    }

    info!("FocusLock завершил работу");
    Ok(())
}

fn init_tracing(config: &Config, level_override: Option<&str>) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let directives = match level_override {
        Some(level) => level.to_string(),
        None => format!("{},{}", config.logging.level, config.logging.filter),
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&directives))?;

    let registry = tracing_subscriber::registry().with(filter);
    match config.logging.format.as_str() {
        "compact" => registry.with(fmt::layer().compact()).init(),
        _ => registry.with(fmt::layer().pretty()).init(),
    }

    Ok(())
}
