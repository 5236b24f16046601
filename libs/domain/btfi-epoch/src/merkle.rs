// [libs/domain/btfi-epoch/src/merkle.rs]
/*!
 * =================================================================
 * APARATO: MERKLE TREE DE HOJAS DE MUESTRA (V1.0)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L3)
 * RESPONSABILIDAD: RAÍZ MERKLE SOBRE LAS HOJAS DE UN EPOCH
 *
 * Regla (spec.md §4.7 paso 3): las hojas forman el nivel 0; en cada nivel
 * se empareja de izquierda a derecha y se concatena `SHA-256(left||right)`;
 * un nivel con número impar de nodos duplica el último antes de emparejar.
 * Caso vacío: la raíz es `SHA-256("")`.
 * =================================================================
 */

use btfi_crypto::canon::sha256_bytes;

/// Computes the Merkle root over `leaf_hashes_hex` (hex-encoded SHA-256
/// digests, one per sample, in insertion order).
pub fn merkle_root(leaf_hashes_hex: &[String]) -> String {
    if leaf_hashes_hex.is_empty() {
        return hex::encode(sha256_bytes(b""));
    }

    let mut level: Vec<[u8; 32]> = leaf_hashes_hex
        .iter()
        .map(|hex_hash| {
            let bytes = hex::decode(hex_hash).expect("leaf hash is valid hex");
            let mut out = [0u8; 32];
            out.copy_from_slice(&bytes);
            out
        })
        .collect();

    while level.len() > 1 {
        if level.len() % 2 == 1 {
            let last = *level.last().unwrap();
            level.push(last);
        }
        level = level
            .chunks(2)
            .map(|pair| {
                let mut concatenated = Vec::with_capacity(64);
                concatenated.extend_from_slice(&pair[0]);
                concatenated.extend_from_slice(&pair[1]);
                sha256_bytes(&concatenated)
            })
            .collect();
    }

    hex::encode(level[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use btfi_crypto::canon::sha256_hex;

    fn leaf(label: &str) -> String {
        sha256_hex(label.as_bytes())
    }

    #[test]
    fn empty_leaf_set_roots_to_sha256_of_empty_string() {
        let root = merkle_root(&[]);
        assert_eq!(root, hex::encode(sha256_bytes(b"")));
    }

    #[test]
    fn four_leaves_match_pairwise_construction() {
        let l0 = leaf("L0");
        let l1 = leaf("L1");
        let l2 = leaf("L2");
        let l3 = leaf("L3");

        let expected = {
            let left = sha256_bytes(
                &[hex::decode(&l0).unwrap(), hex::decode(&l1).unwrap()].concat(),
            );
            let right = sha256_bytes(
                &[hex::decode(&l2).unwrap(), hex::decode(&l3).unwrap()].concat(),
            );
            hex::encode(sha256_bytes(&[left.to_vec(), right.to_vec()].concat()))
        };

        assert_eq!(merkle_root(&[l0, l1, l2, l3]), expected);
    }

    #[test]
    fn three_leaves_duplicate_the_last_at_odd_level() {
        let l0 = leaf("L0");
        let l1 = leaf("L1");
        let l2 = leaf("L2");

        let expected = {
            let left = sha256_bytes(
                &[hex::decode(&l0).unwrap(), hex::decode(&l1).unwrap()].concat(),
            );
            let right = sha256_bytes(
                &[hex::decode(&l2).unwrap(), hex::decode(&l2).unwrap()].concat(),
            );
            hex::encode(sha256_bytes(&[left.to_vec(), right.to_vec()].concat()))
        };

        assert_eq!(merkle_root(&[l0, l1, l2]), expected);
    }

    #[test]
    fn single_leaf_roots_to_itself() {
        let l0 = leaf("ONLY");
        assert_eq!(merkle_root(&[l0.clone()]), l0);
    }
}
