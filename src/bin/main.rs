use level_sensor::{
    config::{Config, SleepMode},
    iio::{IioClimateSensor, IioRangeSensor},
    mqtt::{mqtt_client::MqttClient, MqttConnector},
    network::InterfaceJoin,
    progress::BootClock,
    sleep::{RtcSuspend, SleepBackend, TimerSleep},
    sntp::SntpClient,
    telemetry, CycleRunner, CycleSettings, SensorError, Services,
};
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), SensorError> {
    let clock = BootClock::start();
    let config = Config::from_env()?;
    let _log_guard = telemetry::init(&config.log)?;

    info!(
        broker = %config.mqtt.broker_address(),
        topic = %config.mqtt.topic,
        period = config.period.get(),
        "Booting level sensor"
    );

    let sleep = match config.sleep_mode {
        SleepMode::Timer => SleepBackend::Timer(TimerSleep),
        SleepMode::Rtc => SleepBackend::Rtc(RtcSuspend::new(&config.rtc_device)),
    };
    let services = Services {
        network: InterfaceJoin::new(&config.interface, config.join_timeout),
        time: SntpClient::new(config.ntp_server.clone(), config.ntp_timeout),
        range: IioRangeSensor::new(config.range_device.clone()),
        climate: IioClimateSensor::new(config.climate_device.clone()),
        sink: MqttConnector::new(
            MqttClient::new(config.mqtt.broker_address(), config.mqtt.client_id.clone()),
            config.mqtt.topic.clone(),
        ),
        sleep,
    };
    let settings = CycleSettings {
        period: config.period,
        timing_budget_us: config.timing_budget_us,
    };

    let mut runner = CycleRunner::new(services, settings, clock);
    loop {
        let report = runner.run_cycle().await;
        info!(
            succeeded = report.succeeded(),
            slept_secs = report.slept_secs,
            "Cycle finished"
        );
        if config.run_once {
            return Ok(());
        }
    }
}
