// [libs/domain/enrichment/src/trie.rs]
/*!
 * =================================================================
 * APARATO: BINARY LPM TRIE (V2.0)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: COINCIDENCIA DE PREFIJO MÁS LARGO SOBRE BITS DE RED
 *
 * # Mathematical Proof (Bounded Walk):
 * La profundidad del recorrido está acotada por la longitud de la
 * dirección (32 o 128 bits); la búsqueda es O(W) con W fijo por familia,
 * es decir O(log n) respecto del espacio de direcciones cubierto.
 * =================================================================
 */

/// Nodo del trie binario; 'terminal' transporta la etiqueta CIDR original.
#[derive(Debug, Default)]
struct TrieNode {
    children: [Option<Box<TrieNode>>; 2],
    terminal: Option<String>,
}

/**
 * Trie de prefijos para una familia de direcciones (v4 o v6).
 * Las etiquetas insertadas son los CIDR textuales originales del
 * fichero de amenazas, devueltas tal cual al coincidir.
 */
#[derive(Debug, Default)]
pub struct PrefixTrie {
    root: TrieNode,
    entry_count: usize,
}

impl PrefixTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserta un prefijo de 'prefix_len' bits tomados de 'address_octets'.
    pub fn insert(&mut self, address_octets: &[u8], prefix_len: u8, cidr_label: String) {
        let mut cursor = &mut self.root;

        for bit_index in 0..prefix_len as usize {
            let bit = read_bit(address_octets, bit_index);
            cursor = cursor.children[bit as usize].get_or_insert_with(Box::default);
        }

        if cursor.terminal.replace(cidr_label).is_none() {
            self.entry_count += 1;
        }
    }

    /**
     * Devuelve todas las etiquetas cuyo prefijo cubre la dirección,
     * ordenadas de prefijo más largo a más corto.
     */
    pub fn covering_prefixes(&self, address_octets: &[u8]) -> Vec<String> {
        let mut matched_labels = Vec::new();
        let mut cursor = &self.root;

        if let Some(label) = &cursor.terminal {
            matched_labels.push(label.clone());
        }

        for bit_index in 0..address_octets.len() * 8 {
            let bit = read_bit(address_octets, bit_index);
            match &cursor.children[bit as usize] {
                Some(next_node) => {
                    cursor = next_node;
                    if let Some(label) = &cursor.terminal {
                        matched_labels.push(label.clone());
                    }
                }
                None => break,
            }
        }

        matched_labels.reverse();
        matched_labels
    }

    pub fn len(&self) -> usize {
        self.entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }
}

/// Bit 'index' (orden de red, MSB primero) del arreglo de octetos.
fn read_bit(address_octets: &[u8], index: usize) -> u8 {
    let octet = address_octets[index / 8];
    (octet >> (7 - (index % 8))) & 1
}
