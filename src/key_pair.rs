use openssl::{
    bn::{BigNum, BigNumContext},
    ec::{EcGroup, EcKey},
    error::ErrorStack,
    nid::Nid,
    pkey::{Id, PKey, Private, Public},
    rsa::Rsa,
};
use thiserror::Error;

/// 金鑰相關操作的錯誤列舉。
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("OpenSSL error: {0}")]
    OpenSSL(#[from] ErrorStack),
    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),
}

type Result<T> = std::result::Result<T, KeyError>;

/// 帳戶使用的非對稱金鑰對。
///
/// 私鑰由呼叫端提供（或由 [`KeyPair::generate_rsa`]、[`KeyPair::generate_ec`] 產生），
/// 公鑰在建立時從私鑰派生。本結構不負責金鑰的持久化。
#[derive(Debug, Clone)]
pub struct KeyPair {
    pri_key: PKey<Private>,
    pub_key: PKey<Public>,
}

/// 從私鑰解析出的金鑰描述。
///
/// 每次簽名前都重新解析，不做快取，因為客戶端的金鑰對可能在執行期間被替換。
/// 所有數值欄位皆為大端序位元組。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyDescriptor {
    Rsa {
        bits: u32,
        n: Vec<u8>,
        e: Vec<u8>,
    },
    /// `x`、`y` 已補齊到曲線欄位寬度。
    Ec {
        bits: u32,
        x: Vec<u8>,
        y: Vec<u8>,
    },
}

impl KeyDescriptor {
    pub fn bits(&self) -> u32 {
        match self {
            KeyDescriptor::Rsa { bits, .. } | KeyDescriptor::Ec { bits, .. } => *bits,
        }
    }
}

impl KeyPair {
    /// 以既有的 OpenSSL 私鑰建立金鑰對。
    ///
    /// # 錯誤
    ///
    /// 私鑰既非 RSA 也非 EC 時回傳 [`KeyError::UnsupportedKeyType`]。
    pub fn from_private_key(pri_key: PKey<Private>) -> Result<Self> {
        let pub_key = Self::derive_public_key(&pri_key)?;
        Ok(Self { pri_key, pub_key })
    }

    /// 根據 PEM 格式的私鑰資料建立金鑰對。
    pub fn from_pem(pri_key_pem: &[u8]) -> Result<Self> {
        Self::from_private_key(PKey::private_key_from_pem(pri_key_pem)?)
    }

    /// 產生指定長度的 RSA 金鑰對。
    pub fn generate_rsa(bits: u32) -> Result<Self> {
        Self::from_private_key(PKey::from_rsa(Rsa::generate(bits)?)?)
    }

    /// 在指定曲線上產生 EC 金鑰對，例如 `Nid::X9_62_PRIME256V1`。
    pub fn generate_ec(curve: Nid) -> Result<Self> {
        let group = EcGroup::from_curve_name(curve)?;
        Self::from_private_key(PKey::from_ec_key(EcKey::generate(&group)?)?)
    }

    pub fn private_key(&self) -> &PKey<Private> {
        &self.pri_key
    }

    pub fn public_key(&self) -> &PKey<Public> {
        &self.pub_key
    }

    /// 以 PKCS#8 PEM 格式匯出私鑰，供呼叫端自行保存。
    pub fn to_pem(&self) -> Result<Vec<u8>> {
        Ok(self.pri_key.private_key_to_pem_pkcs8()?)
    }

    /// 解析金鑰類型、長度與建構 JWK 所需的公開參數。
    ///
    /// RSA 的 `n`、`e` 直接取 OpenSSL 的大端序表示；
    /// EC 的座標依曲線位元長度補齊前導零。
    pub fn descriptor(&self) -> Result<KeyDescriptor> {
        match self.pri_key.id() {
            Id::RSA => {
                let rsa = self.pri_key.rsa()?;
                Ok(KeyDescriptor::Rsa {
                    bits: self.pri_key.bits(),
                    n: rsa.n().to_vec(),
                    e: rsa.e().to_vec(),
                })
            }
            Id::EC => {
                let ec = self.pri_key.ec_key()?;
                let group = ec.group();
                let bits = group.degree();
                let width = bits.div_ceil(8) as i32;

                let mut ctx = BigNumContext::new()?;
                let mut x = BigNum::new()?;
                let mut y = BigNum::new()?;
                ec.public_key()
                    .affine_coordinates_gfp(group, &mut x, &mut y, &mut ctx)?;

                Ok(KeyDescriptor::Ec {
                    bits,
                    x: x.to_vec_padded(width)?,
                    y: y.to_vec_padded(width)?,
                })
            }
            id => Err(KeyError::UnsupportedKeyType(format!(
                "pkey id {}",
                id.as_raw()
            ))),
        }
    }

    fn derive_public_key(pri_key: &PKey<Private>) -> Result<PKey<Public>> {
        match pri_key.id() {
            Id::RSA => {
                let rsa = pri_key.rsa()?;
                let pub_rsa =
                    Rsa::from_public_components(rsa.n().to_owned()?, rsa.e().to_owned()?)?;
                Ok(PKey::from_rsa(pub_rsa)?)
            }
            Id::EC => {
                let ec = pri_key.ec_key()?;
                let pub_ec = EcKey::from_public_key(ec.group(), ec.public_key())?;
                Ok(PKey::from_ec_key(pub_ec)?)
            }
            id => Err(KeyError::UnsupportedKeyType(format!(
                "pkey id {}",
                id.as_raw()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsa_descriptor() -> Result<()> {
        let key_pair = KeyPair::generate_rsa(2048)?;
        match key_pair.descriptor()? {
            KeyDescriptor::Rsa { bits, n, e } => {
                assert_eq!(bits, 2048);
                assert_eq!(n.len(), 256);
                assert_eq!(e, vec![0x01, 0x00, 0x01]);
            }
            other => panic!("expected RSA descriptor, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_ec_descriptor_widths() -> Result<()> {
        let cases = [
            (Nid::X9_62_PRIME256V1, 256, 32),
            (Nid::SECP384R1, 384, 48),
            (Nid::SECP521R1, 521, 66),
        ];

        for (curve, expected_bits, width) in cases {
            let key_pair = KeyPair::generate_ec(curve)?;
            assert_eq!(key_pair.descriptor()?.bits(), expected_bits);
            match key_pair.descriptor()? {
                KeyDescriptor::Ec { bits, x, y } => {
                    assert_eq!(bits, expected_bits);
                    assert_eq!(x.len(), width);
                    assert_eq!(y.len(), width);
                }
                other => panic!("expected EC descriptor, got {other:?}"),
            }
        }
        Ok(())
    }

    #[test]
    fn test_unsupported_key_type() -> Result<()> {
        let ed = PKey::generate_ed25519()?;
        assert!(matches!(
            KeyPair::from_private_key(ed),
            Err(KeyError::UnsupportedKeyType(_))
        ));
        Ok(())
    }

    #[test]
    fn test_pem_round_trip_keeps_descriptor() -> Result<()> {
        let key_pair = KeyPair::generate_ec(Nid::SECP384R1)?;
        let restored = KeyPair::from_pem(&key_pair.to_pem()?)?;
        assert_eq!(key_pair.descriptor()?, restored.descriptor()?);
        Ok(())
    }
}
