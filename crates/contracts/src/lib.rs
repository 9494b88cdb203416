//! Typed bindings for the LaserGun mixer contract and the ERC-20 surface
//! the SDK consumes.
//!
//! The mixer address is deployment-specific and always comes from
//! configuration, so there is no deployments table here; instances are
//! constructed with `ILaserGun::new(address, provider)`.

use alloy::primitives::B256;

pub use alloy::providers::DynProvider as Provider;

/// Passed as the new-commitment argument of `unshield` when no remainder
/// shield is created.
pub const ZERO_COMMITMENT: B256 = B256::ZERO;

alloy::sol!(
    #[allow(missing_docs, clippy::too_many_arguments)]
    #[sol(rpc)]
    interface ILaserGun {
        event Shielded(bytes32 indexed commitment, address indexed token, uint256 amount, uint256 fee);
        event Unshielded(bytes32 indexed commitment, address indexed token, uint256 amount, uint256 fee);
        event SecretDelivered(bytes encryptedSecret);
        event ShieldConsolidated(bytes32[] indexed oldCommitments, bytes32 indexed newCommitment);

        function shield(uint256 amount, address token, bytes32 commitment) external;
        function unshield(bytes32 secret, uint256 amount, address recipient, bytes32 newCommitment) external;
        function transfer(bytes32 secret, uint256 amount, bytes32 recipientCommitment, bytes calldata encryptedSecret) external;
        function consolidate(bytes32[] calldata secrets, bytes32 newCommitment) external;
        function registerPublicKey(bytes calldata publicKey) external;

        function getShieldInfo(bytes32 commitment) external view returns (bool exists, address token, uint256 amount, uint256 timestamp, bool spent);
        function getShieldBalance(bytes32 secret, address token) external view returns (uint256);
        function isCommitmentActive(bytes32 commitment) external view returns (bool);
        function publicKeys(address owner) external view returns (bytes memory);
        function shieldFeePercent() external view returns (uint256);
        function unshieldFeePercent() external view returns (uint256);
        function transferFeePercent() external view returns (uint256);
        function FEE_DENOMINATOR() external view returns (uint256);
    }
);

alloy::sol!(
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function symbol() external view returns (string memory);
        function name() external view returns (string memory);
        function decimals() external view returns (uint8);
    }
);

/// Mixer instance bound to the erased provider the SDK passes around.
pub type LaserGun = ILaserGun::ILaserGunInstance<Provider>;

/// ERC-20 instance bound to the erased provider.
pub type Erc20 = IERC20::IERC20Instance<Provider>;

#[cfg(test)]
mod tests {
    use {
        super::*,
        alloy::{primitives::keccak256, sol_types::{SolCall, SolEvent}},
    };

    #[test]
    fn event_signatures_match_the_abi() {
        assert_eq!(
            ILaserGun::Shielded::SIGNATURE,
            "Shielded(bytes32,address,uint256,uint256)"
        );
        assert_eq!(
            ILaserGun::Unshielded::SIGNATURE,
            "Unshielded(bytes32,address,uint256,uint256)"
        );
        assert_eq!(ILaserGun::SecretDelivered::SIGNATURE, "SecretDelivered(bytes)");
        assert_eq!(
            ILaserGun::ShieldConsolidated::SIGNATURE,
            "ShieldConsolidated(bytes32[],bytes32)"
        );
        for (signature, hash) in [
            (
                ILaserGun::Shielded::SIGNATURE,
                ILaserGun::Shielded::SIGNATURE_HASH,
            ),
            (
                ILaserGun::Unshielded::SIGNATURE,
                ILaserGun::Unshielded::SIGNATURE_HASH,
            ),
            (
                ILaserGun::SecretDelivered::SIGNATURE,
                ILaserGun::SecretDelivered::SIGNATURE_HASH,
            ),
            (
                ILaserGun::ShieldConsolidated::SIGNATURE,
                ILaserGun::ShieldConsolidated::SIGNATURE_HASH,
            ),
        ] {
            assert_eq!(keccak256(signature.as_bytes()), hash);
        }
    }

    #[test]
    fn write_selectors_match_the_abi() {
        assert_eq!(
            ILaserGun::shieldCall::SELECTOR,
            keccak256(b"shield(uint256,address,bytes32)")[..4]
        );
        assert_eq!(
            ILaserGun::unshieldCall::SELECTOR,
            keccak256(b"unshield(bytes32,uint256,address,bytes32)")[..4]
        );
        assert_eq!(
            ILaserGun::transferCall::SELECTOR,
            keccak256(b"transfer(bytes32,uint256,bytes32,bytes)")[..4]
        );
        assert_eq!(
            ILaserGun::consolidateCall::SELECTOR,
            keccak256(b"consolidate(bytes32[],bytes32)")[..4]
        );
        assert_eq!(
            ILaserGun::registerPublicKeyCall::SELECTOR,
            keccak256(b"registerPublicKey(bytes)")[..4]
        );
    }

    #[test]
    fn erc20_selectors_match_the_abi() {
        assert_eq!(
            IERC20::approveCall::SELECTOR,
            keccak256(b"approve(address,uint256)")[..4]
        );
        assert_eq!(
            IERC20::balanceOfCall::SELECTOR,
            keccak256(b"balanceOf(address)")[..4]
        );
        assert_eq!(
            IERC20::allowanceCall::SELECTOR,
            keccak256(b"allowance(address,address)")[..4]
        );
    }
}
