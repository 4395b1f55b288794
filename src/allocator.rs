//! Zuteilungslogik für Auftragszeilen auf Paletten.
//!
//! Dieses Modul implementiert einen gierigen First-Fit-Algorithmus mit Prioritäten
//! unter Berücksichtigung von:
//! - Gewichtsgrenzen pro Palette
//! - Lagenhöhe (Anzahl Kartonlagen)
//! - Trennung nach Filiale und Temperaturklasse
//! - Zerbrechlicher Ware (nur auf leichte Paletten, oben)

use std::cmp::Ordering;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::model::{FRAGILE_INSTRUCTION, FROZEN_INSTRUCTION, Item, OrderLine, Pallet, PalletType};
use crate::types::{
    DEFAULT_FRAGILE_WEIGHT_CEILING, DEFAULT_MAX_LAYERS, DEFAULT_MAX_WEIGHT, EPSILON_GENERAL,
    utilization_percent,
};

/// Abzug im Prioritätswert für zerbrechliche Ware, damit sie zuletzt (oben) landet.
const CAREFUL_PRIORITY_PENALTY: f64 = 1000.0;

/// Konfiguration für den Zuteilungsalgorithmus.
///
/// Enthält alle Grenzwerte, die eine Palette einhalten muss.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AllocationConfig {
    /// Maximales Gesamtgewicht einer Palette in kg
    pub max_weight: f64,
    /// Maximale Anzahl Kartonlagen
    pub max_layers: u32,
    /// Zerbrechliche Ware nur auf Paletten unterhalb dieses Gewichts
    pub fragile_weight_ceiling: f64,
    /// Allgemeine numerische Toleranz
    pub general_epsilon: f64,
}

impl AllocationConfig {
    pub const DEFAULT_MAX_WEIGHT: f64 = DEFAULT_MAX_WEIGHT;
    pub const DEFAULT_MAX_LAYERS: u32 = DEFAULT_MAX_LAYERS;
    pub const DEFAULT_FRAGILE_WEIGHT_CEILING: f64 = DEFAULT_FRAGILE_WEIGHT_CEILING;
    pub const DEFAULT_GENERAL_EPSILON: f64 = EPSILON_GENERAL;

    /// Erstellt einen Builder für benutzerdefinierte Konfiguration.
    pub fn builder() -> AllocationConfigBuilder {
        AllocationConfigBuilder::default()
    }

    /// Prüft, ob eine Palette zusätzliches Gewicht und zusätzliche Lagen aufnehmen kann.
    ///
    /// Für zerbrechliche Ware muss die Palette zusätzlich noch unter der
    /// Gewichtsgrenze für empfindliche Güter liegen.
    pub fn admits(&self, pallet: &Pallet, weight: f64, layers: u32, careful: bool) -> bool {
        if pallet.total_weight + weight > self.max_weight + self.general_epsilon {
            return false;
        }
        if pallet.layers + layers > self.max_layers {
            return false;
        }
        if careful {
            return pallet.total_weight < self.fragile_weight_ceiling;
        }
        true
    }

    /// Auslastung in Prozent bezogen auf das Maximalgewicht.
    pub fn utilization_percent(&self, weight: f64) -> f64 {
        utilization_percent(weight, self.max_weight)
    }
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            max_weight: Self::DEFAULT_MAX_WEIGHT,
            max_layers: Self::DEFAULT_MAX_LAYERS,
            fragile_weight_ceiling: Self::DEFAULT_FRAGILE_WEIGHT_CEILING,
            general_epsilon: Self::DEFAULT_GENERAL_EPSILON,
        }
    }
}

/// Builder-Pattern für AllocationConfig.
#[derive(Clone, Debug, Default)]
pub struct AllocationConfigBuilder {
    config: AllocationConfig,
}

impl AllocationConfigBuilder {
    /// Setzt das maximale Palettengewicht.
    pub fn max_weight(mut self, weight: f64) -> Self {
        self.config.max_weight = weight;
        self
    }

    /// Setzt die maximale Lagenanzahl.
    pub fn max_layers(mut self, layers: u32) -> Self {
        self.config.max_layers = layers;
        self
    }

    /// Setzt die Gewichtsgrenze für zerbrechliche Ware.
    pub fn fragile_weight_ceiling(mut self, weight: f64) -> Self {
        self.config.fragile_weight_ceiling = weight;
        self
    }

    /// Setzt die allgemeine Toleranz.
    pub fn general_epsilon(mut self, epsilon: f64) -> Self {
        self.config.general_epsilon = epsilon;
        self
    }

    /// Erstellt die finale Konfiguration.
    pub fn build(self) -> AllocationConfig {
        self.config
    }
}

/// Ergebnis der Zuteilung.
#[derive(Clone, Debug, Default)]
pub struct Allocation {
    pub pallets: Vec<Pallet>,
}

impl Allocation {
    /// Gibt die Gesamtanzahl der Paletten zurück.
    pub fn pallet_count(&self) -> usize {
        self.pallets.len()
    }

    /// Berechnet das Gesamtgewicht aller Paletten.
    pub fn total_weight(&self) -> f64 {
        self.pallets.iter().map(|p| p.total_weight).sum()
    }

    /// Berechnet die durchschnittliche Auslastung aller Paletten.
    pub fn average_utilization(&self, config: &AllocationConfig) -> f64 {
        if self.pallets.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .pallets
            .iter()
            .map(|p| config.utilization_percent(p.total_weight))
            .sum();
        sum / self.pallets.len() as f64
    }

    pub fn into_pallets(self) -> Vec<Pallet> {
        self.pallets
    }
}

/// Auftragszeile, die auf keiner Palette Platz finden kann.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnplaceableLine {
    pub index: usize,
    pub sku: String,
    pub store: String,
    pub reason: UnplaceableReason,
}

impl std::fmt::Display for UnplaceableLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Order line {} ({} for {}): {}",
            self.index, self.sku, self.store, self.reason
        )
    }
}

/// Gründe, warum eine Auftragszeile nicht platziert werden kann.
#[derive(Clone, Debug, PartialEq, Error, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum UnplaceableReason {
    #[error("line weighs {weight:.1} kg, pallet limit is {limit:.1} kg")]
    TooHeavyForPallet { weight: f64, limit: f64 },
    #[error("line needs {layers} layers, pallet limit is {limit}")]
    TooManyLayers { layers: u32, limit: u32 },
}

impl UnplaceableReason {
    pub fn code(&self) -> &'static str {
        match self {
            UnplaceableReason::TooHeavyForPallet { .. } => "too_heavy_for_pallet",
            UnplaceableReason::TooManyLayers { .. } => "too_many_layers",
        }
    }
}

/// Ereignisse während der Zuteilung, z.B. für Debug-Ausgaben.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum AllocationEvent {
    /// Eine neue Palette wird begonnen.
    PalletStarted {
        pallet_id: String,
        store: String,
        pallet_type: PalletType,
    },
    /// Eine Auftragszeile wurde platziert.
    LinePlaced {
        pallet_id: String,
        sku: String,
        quantity: u32,
        weight: f64,
        total_weight: f64,
        layers: u32,
    },
    /// Zuteilung abgeschlossen.
    Finished { pallets: usize },
}

/// Prioritätswert einer Zeile: schwere, mengenstarke Ware zuerst (unten),
/// zerbrechliche Ware und Flaschen zuletzt (oben).
pub fn priority_score(line: &OrderLine) -> f64 {
    let mut score = line.weight * 10.0 + f64::from(line.quantity);
    if line.handled_with_care() {
        score -= CAREFUL_PRIORITY_PENALTY;
    }
    score
}

/// Hauptfunktion zur Zuteilung von Auftragszeilen auf Paletten.
///
/// # Parameter
/// * `lines` - Validierte Auftragszeilen
///
/// # Rückgabewert
/// `Allocation` mit allen Paletten, oder `EngineError::Unplaceable`,
/// wenn eine Zeile allein die Palettengrenzen sprengt
pub fn allocate(lines: &[OrderLine]) -> Result<Allocation, EngineError> {
    allocate_with_config(lines, AllocationConfig::default())
}

/// Zuteilung mit benutzerdefinierter Konfiguration.
pub fn allocate_with_config(
    lines: &[OrderLine],
    config: AllocationConfig,
) -> Result<Allocation, EngineError> {
    allocate_with_progress(lines, config, |_| {})
}

/// Zuteilung mit Progress-Callback.
///
/// Alle Zeilen werden vor Beginn geprüft; ist auch nur eine unplatzierbar,
/// wird nichts zugeteilt.
pub fn allocate_with_progress(
    lines: &[OrderLine],
    config: AllocationConfig,
    mut on_event: impl FnMut(&AllocationEvent),
) -> Result<Allocation, EngineError> {
    let unplaceable = find_unplaceable_lines(lines, &config);
    if !unplaceable.is_empty() {
        return Err(EngineError::Unplaceable(unplaceable));
    }

    let mut pallets: Vec<Pallet> = Vec::new();

    for (store, store_lines) in group_by_store(lines) {
        let (frozen, regular): (Vec<&OrderLine>, Vec<&OrderLine>) =
            store_lines.into_iter().partition(|line| line.is_frozen());

        for (pallet_type, pool) in [(PalletType::Regular, regular), (PalletType::Frozen, frozen)] {
            if pool.is_empty() {
                continue;
            }
            let packed = pack_pool(store, pallet_type, pool, &config, &mut on_event);
            pallets.extend(packed);
        }
    }

    on_event(&AllocationEvent::Finished {
        pallets: pallets.len(),
    });
    info!(
        "📦 Allocated {} order lines onto {} pallets",
        lines.len(),
        pallets.len()
    );
    Ok(Allocation { pallets })
}

/// Findet alle Zeilen, die allein schon Gewicht oder Lagen überschreiten.
pub fn find_unplaceable_lines(lines: &[OrderLine], config: &AllocationConfig) -> Vec<UnplaceableLine> {
    lines
        .iter()
        .enumerate()
        .filter_map(|(index, line)| {
            let weight = line.line_weight();
            let layers = line.layers_needed();
            let reason = if weight > config.max_weight + config.general_epsilon {
                UnplaceableReason::TooHeavyForPallet {
                    weight,
                    limit: config.max_weight,
                }
            } else if layers > config.max_layers {
                UnplaceableReason::TooManyLayers {
                    layers,
                    limit: config.max_layers,
                }
            } else {
                return None;
            };
            Some(UnplaceableLine {
                index,
                sku: line.sku.clone(),
                store: line.store.clone(),
                reason,
            })
        })
        .collect()
}

/// Gruppiert Zeilen nach Filiale in der Reihenfolge des ersten Auftretens.
fn group_by_store(lines: &[OrderLine]) -> Vec<(&str, Vec<&OrderLine>)> {
    let mut groups: Vec<(&str, Vec<&OrderLine>)> = Vec::new();
    for line in lines {
        match groups.iter_mut().find(|(store, _)| *store == line.store) {
            Some((_, group)) => group.push(line),
            None => groups.push((line.store.as_str(), vec![line])),
        }
    }
    groups
}

/// Packt einen Pool (eine Filiale, eine Temperaturklasse) per First-Fit.
fn pack_pool(
    store: &str,
    pallet_type: PalletType,
    mut pool: Vec<&OrderLine>,
    config: &AllocationConfig,
    on_event: &mut impl FnMut(&AllocationEvent),
) -> Vec<Pallet> {
    // Stabile Sortierung: gleiche Priorität behält die Eingabereihenfolge
    pool.sort_by(|a, b| {
        priority_score(b)
            .partial_cmp(&priority_score(a))
            .unwrap_or(Ordering::Equal)
    });

    let mut pallets: Vec<Pallet> = Vec::new();

    for line in pool {
        let weight = line.line_weight();
        let layers = line.layers_needed();
        let careful = line.handled_with_care();

        let target = match pallets
            .iter()
            .position(|pallet| config.admits(pallet, weight, layers, careful))
        {
            Some(idx) => idx,
            None => {
                let pallet = Pallet::new(store, pallet_type, pallets.len());
                on_event(&AllocationEvent::PalletStarted {
                    pallet_id: pallet.id.clone(),
                    store: store.to_string(),
                    pallet_type,
                });
                debug!(store, %pallet_type, pallet_id = %pallet.id, "started new pallet");
                pallets.push(pallet);
                pallets.len() - 1
            }
        };

        let pallet = &mut pallets[target];
        place_line(pallet, line);
        on_event(&AllocationEvent::LinePlaced {
            pallet_id: pallet.id.clone(),
            sku: line.sku.clone(),
            quantity: line.quantity,
            weight,
            total_weight: pallet.total_weight,
            layers: pallet.layers,
        });
    }

    pallets
}

/// Legt eine Zeile oben auf die Palette und ergänzt Handhabungshinweise.
fn place_line(pallet: &mut Pallet, line: &OrderLine) {
    pallet.push_item(Item::from_line(line));

    if line.handled_with_care() {
        pallet.add_instruction(FRAGILE_INSTRUCTION);
    }
    if line.is_frozen() {
        pallet.add_instruction(FROZEN_INSTRUCTION);
    }
}
