use anyhow::Result;
use btleplug::api::{Central as _, CentralEvent, CentralState, Peripheral as _, ScanFilter};
use futures::StreamExt as _;
use log::{debug, info};
use mac_address::MacAddress;
use tokio::sync::mpsc;

use crate::messages::Sighting;
use crate::scanner::ScanSession;

/// Owns the Bluetooth adapter and turns its advertisement events into
/// [`Sighting`]s.
pub struct Manager {
    adapter: btleplug::platform::Adapter,
    session: ScanSession,
}

impl Manager {
    pub fn new(adapter: btleplug::platform::Adapter) -> Self {
        Manager {
            adapter,
            session: ScanSession::default(),
        }
    }

    async fn on_state(&mut self, state: CentralState) -> Result<()> {
        let powered_on = matches!(state, CentralState::PoweredOn);
        if self.session.on_medium_state(powered_on) {
            info!("Adapter powered on, starting scan");
            self.adapter.start_scan(ScanFilter::default()).await?;
        } else if !self.session.is_scanning() {
            info!("Waiting for adapter to power on ({:?})", state);
        }
        Ok(())
    }

    /// Runs until the adapter's event stream ends or the consumer goes away.
    pub async fn run_loop(mut self, sightings: mpsc::Sender<Sighting>) -> Result<()> {
        let mut events = self.adapter.events().await?;

        let state = self.adapter.adapter_state().await?;
        self.on_state(state).await?;

        while let Some(event) = events.next().await {
            match event {
                CentralEvent::StateUpdate(state) => self.on_state(state).await?,
                CentralEvent::ManufacturerDataAdvertisement {
                    id,
                    manufacturer_data,
                } => {
                    let address = match self.adapter.peripheral(&id).await {
                        Ok(peripheral) => MacAddress::new(peripheral.address().into_inner()),
                        Err(err) => {
                            debug!("Skipping advertisement from {:?}: {}", id, err);
                            continue;
                        }
                    };
                    for (company_id, data) in manufacturer_data {
                        let mut raw = company_id.to_le_bytes().to_vec();
                        raw.extend(data);
                        if sightings.send(Sighting::new(address, raw)).await.is_err() {
                            info!("Consumer stopped, ending scan loop");
                            return Ok(());
                        }
                    }
                }
                _ => {}
            }
        }

        info!("No more Bluetooth events");
        Ok(())
    }
}
