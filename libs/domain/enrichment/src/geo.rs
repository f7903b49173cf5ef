// [libs/domain/enrichment/src/geo.rs]
/*!
 * =================================================================
 * APARATO: GEO/ASN RESOLUTION ENGINE (V3.0 - ATOMIC READER SWAP)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: IP -> {PAÍS, CIUDAD, COORDENADAS, ASN, ORGANIZACIÓN}
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. READ-ONLY MOUNT: Las bases city/ASN se cargan una vez desde disco
 *    de solo lectura; la búsqueda es O(log n) sobre el árbol MaxMind.
 * 2. ATOMIC SWAP: La recarga (SIGHUP o disparo administrativo) publica
 *    lectores nuevos con un swap; los lectores en vuelo terminan sobre
 *    la generación anterior.
 * 3. NULL DEGRADATION: Base ausente o dirección sin cobertura degradan
 *    a null, jamás a error.
 * =================================================================
 */

use arc_swap::ArcSwapOption;
use maxminddb::geoip2;
use panoptes_domain_models::record::{AsnContext, GeoContext};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

type MmdbReader = maxminddb::Reader<Vec<u8>>;

/// Respuesta de la operación de búsqueda; ambas mitades anulables.
#[derive(Debug, Clone, Default)]
pub struct GeoAsnAnswer {
    pub geo: Option<GeoContext>,
    pub asn: Option<AsnContext>,
}

/// Estado observable del motor para /system.
#[derive(Debug, Clone, serde::Serialize)]
pub struct GeoStatus {
    pub city_database_loaded: bool,
    pub asn_database_loaded: bool,
    pub city_database_path: Option<String>,
    pub asn_database_path: Option<String>,
}

/**
 * Motor de resolución geo/ASN con manijas de lector intercambiables.
 */
pub struct GeoEngine {
    city_reader_handle: ArcSwapOption<MmdbReader>,
    asn_reader_handle: ArcSwapOption<MmdbReader>,
    city_database_path: Option<PathBuf>,
    asn_database_path: Option<PathBuf>,
}

impl GeoEngine {
    /**
     * Carga inicial de ambas bases. Una base ausente o corrupta deja su
     * manija en None y se reporta; el proceso arranca igualmente.
     */
    pub fn bootstrap(city_database_path: Option<PathBuf>, asn_database_path: Option<PathBuf>) -> Self {
        let engine = Self {
            city_reader_handle: ArcSwapOption::const_empty(),
            asn_reader_handle: ArcSwapOption::const_empty(),
            city_database_path,
            asn_database_path,
        };
        engine.reload();
        engine
    }

    /// Motor sin bases, para entornos donde el geo está deshabilitado.
    pub fn disabled() -> Self {
        Self {
            city_reader_handle: ArcSwapOption::const_empty(),
            asn_reader_handle: ArcSwapOption::const_empty(),
            city_database_path: None,
            asn_database_path: None,
        }
    }

    /**
     * Recarga ambas bases desde disco y publica los lectores nuevos.
     * Invocada por el listener de SIGHUP y por el disparo administrativo.
     */
    pub fn reload(&self) {
        match &self.city_database_path {
            Some(city_path) => match maxminddb::Reader::open_readfile(city_path) {
                Ok(fresh_reader) => {
                    self.city_reader_handle.store(Some(Arc::new(fresh_reader)));
                    info!("🗺️  [GEO_ENGINE]: City database levelized from {:?}.", city_path);
                }
                Err(load_fault) => {
                    warn!("⚠️ [GEO_ENGINE]: City database unavailable ({}). Lookups degrade to null.", load_fault);
                    self.city_reader_handle.store(None);
                }
            },
            None => self.city_reader_handle.store(None),
        }

        match &self.asn_database_path {
            Some(asn_path) => match maxminddb::Reader::open_readfile(asn_path) {
                Ok(fresh_reader) => {
                    self.asn_reader_handle.store(Some(Arc::new(fresh_reader)));
                    info!("🛰️  [GEO_ENGINE]: ASN database levelized from {:?}.", asn_path);
                }
                Err(load_fault) => {
                    warn!("⚠️ [GEO_ENGINE]: ASN database unavailable ({}). Lookups degrade to null.", load_fault);
                    self.asn_reader_handle.store(None);
                }
            },
            None => self.asn_reader_handle.store(None),
        }
    }

    /**
     * Resuelve el contexto geo/ASN de una dirección.
     * Operación síncrona, thread-safe y sin errores: toda falla degrada a null.
     */
    pub fn lookup(&self, address: IpAddr) -> GeoAsnAnswer {
        GeoAsnAnswer {
            geo: self.lookup_city(address),
            asn: self.lookup_asn(address),
        }
    }

    fn lookup_city(&self, address: IpAddr) -> Option<GeoContext> {
        let reader_guard = self.city_reader_handle.load();
        let reader = reader_guard.as_ref()?;
        let city_answer: geoip2::City = reader.lookup(address).ok()?;

        let country_code = city_answer
            .country
            .as_ref()
            .and_then(|country| country.iso_code)
            .map(|code| code.to_string());

        let city_name = city_answer
            .city
            .as_ref()
            .and_then(|city| city.names.as_ref())
            .and_then(|names| names.get("en"))
            .map(|name| name.to_string());

        let (latitude, longitude) = city_answer
            .location
            .as_ref()
            .map(|location| (location.latitude, location.longitude))
            .unwrap_or((None, None));

        Some(GeoContext { country: country_code, city: city_name, latitude, longitude })
    }

    fn lookup_asn(&self, address: IpAddr) -> Option<AsnContext> {
        let reader_guard = self.asn_reader_handle.load();
        let reader = reader_guard.as_ref()?;
        let asn_answer: geoip2::Asn = reader.lookup(address).ok()?;

        Some(AsnContext {
            number: asn_answer.autonomous_system_number,
            organization: asn_answer
                .autonomous_system_organization
                .map(|organization| organization.to_string()),
        })
    }

    pub fn status(&self) -> GeoStatus {
        GeoStatus {
            city_database_loaded: self.city_reader_handle.load().is_some(),
            asn_database_loaded: self.asn_reader_handle.load().is_some(),
            city_database_path: self
                .city_database_path
                .as_ref()
                .map(|path| path.display().to_string()),
            asn_database_path: self
                .asn_database_path
                .as_ref()
                .map(|path| path.display().to_string()),
        }
    }
}
