mod common;

use common::{genesis_tx_hash, memory_chain, next_block, transfer};
use data_encoding::HEXLOWER;
use ledger_node::{
    genesis_block, genesis_key, Block, BlockStore, Chain, Header, KeyPair, LedgerError,
    MemoryUtxoStore, MerkleTree, SledStores,
};
use tempfile::TempDir;

fn sled_chain(dir: &TempDir) -> Chain {
    let stores = SledStores::open(dir.path()).unwrap();
    Chain::with_stores(
        Box::new(stores.block_store().unwrap()),
        Box::new(stores.tx_store().unwrap()),
        Box::new(stores.utxo_store().unwrap()),
    )
    .unwrap()
}

#[test]
fn test_split_genesis_output() {
    let chain = memory_chain();
    let sender = genesis_key().unwrap();
    let recipient = KeyPair::generate().unwrap();

    let tx = transfer(
        &sender,
        &genesis_tx_hash(),
        0,
        &[(100, recipient.address()), (900, sender.address())],
    );
    assert!(tx.verify());

    chain
        .add_block(&next_block(&chain, &sender, vec![tx.clone()]))
        .unwrap();
    assert_eq!(chain.height().unwrap(), 1);

    let tx_hash = tx.hash_hex().unwrap();
    let to_recipient = chain.get_utxo(&tx_hash, 0).unwrap();
    assert_eq!(to_recipient.get_amount(), 100);
    assert!(to_recipient.is_owned_by(&recipient.address()));
    assert_eq!(chain.get_utxo(&tx_hash, 1).unwrap().get_amount(), 900);

    // the recipient can spend what it received
    let onward = transfer(&recipient, &tx.hash().unwrap(), 0, &[(100, sender.address())]);
    chain.check_transaction(&onward).unwrap();
}

#[test]
fn test_bad_tx_signature_leaves_stores_untouched() {
    let chain = memory_chain();
    let sender = genesis_key().unwrap();
    let intruder = KeyPair::generate().unwrap();

    let mut tx = transfer(&sender, &genesis_tx_hash(), 0, &[(1000, intruder.address())]);
    let forged = tx.sign(&intruder).unwrap();
    tx.input_mut(0).unwrap().set_signature(&forged);

    let block = next_block(&chain, &sender, vec![tx.clone()]);
    assert_eq!(
        chain.add_block(&block).unwrap_err(),
        LedgerError::Validation("bad tx signature".to_string())
    );
    assert_eq!(chain.height().unwrap(), 0);
    assert!(chain
        .get_transaction(&tx.hash_hex().unwrap())
        .unwrap_err()
        .is_not_found());
    assert!(chain.get_block_by_hash(&block.hash().unwrap()).is_err());
}

#[test]
fn test_swapped_transactions_are_detected() {
    let chain = memory_chain();
    let sender = genesis_key().unwrap();
    let honest = transfer(&sender, &genesis_tx_hash(), 0, &[(1000, sender.address())]);
    let mut block = next_block(&chain, &sender, vec![honest]);

    let thief = KeyPair::generate().unwrap();
    block.transactions_mut()[0] =
        transfer(&sender, &genesis_tx_hash(), 0, &[(1000, thief.address())]);

    assert_eq!(
        chain.add_block(&block).unwrap_err(),
        LedgerError::Validation("bad transactions root".to_string())
    );
}

#[test]
fn test_chain_of_spends() {
    let chain = memory_chain();
    let producer = KeyPair::generate().unwrap();
    let mut owner = genesis_key().unwrap();
    let mut prev_hash = genesis_tx_hash();

    for height in 1..=5u64 {
        let next_owner = KeyPair::generate().unwrap();
        let tx = transfer(&owner, &prev_hash, 0, &[(1000, next_owner.address())]);
        prev_hash = tx.hash().unwrap();
        chain
            .add_block(&next_block(&chain, &producer, vec![tx]))
            .unwrap();
        assert_eq!(chain.height().unwrap(), height);
        owner = next_owner;
    }

    let last = chain.get_utxo(&HEXLOWER.encode(&prev_hash), 0).unwrap();
    assert!(!last.is_spent());
    assert!(last.is_owned_by(&owner.address()));
}

#[test]
fn test_sled_chain_resumes_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let sender = genesis_key().unwrap();
    let recipient = KeyPair::generate().unwrap();
    let tx = transfer(
        &sender,
        &genesis_tx_hash(),
        0,
        &[(100, recipient.address()), (900, sender.address())],
    );

    let head = {
        let chain = sled_chain(&dir);
        assert_eq!(chain.height().unwrap(), 0);
        chain
            .add_block(&next_block(&chain, &sender, vec![tx.clone()]))
            .unwrap();
        chain
            .add_block(&next_block(&chain, &sender, vec![]))
            .unwrap();
        chain.head().unwrap()
    };

    let chain = sled_chain(&dir);
    assert_eq!(chain.height().unwrap(), 2);
    assert_eq!(chain.head().unwrap(), head);
    assert_eq!(chain.get_block_by_height(0).unwrap(), genesis_block().unwrap());
    assert!(chain
        .get_utxo(&HEXLOWER.encode(&genesis_tx_hash()), 0)
        .unwrap()
        .is_spent());

    // the spent genesis output stays spent across the restart
    let replay = next_block(&chain, &sender, vec![tx]);
    assert_eq!(
        chain.add_block(&replay).unwrap_err(),
        LedgerError::Validation("input already spent".to_string())
    );
}

#[test]
fn test_memory_utxo_set_is_rebuilt_from_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let sender = genesis_key().unwrap();
    let tx = transfer(&sender, &genesis_tx_hash(), 0, &[(1000, sender.address())]);

    {
        let chain = sled_chain(&dir);
        chain
            .add_block(&next_block(&chain, &sender, vec![tx.clone()]))
            .unwrap();
    }

    let stores = SledStores::open(dir.path()).unwrap();
    let chain = Chain::with_stores(
        Box::new(stores.block_store().unwrap()),
        Box::new(stores.tx_store().unwrap()),
        Box::new(MemoryUtxoStore::new()),
    )
    .unwrap();

    assert_eq!(chain.height().unwrap(), 1);
    assert!(chain
        .get_utxo(&HEXLOWER.encode(&genesis_tx_hash()), 0)
        .unwrap()
        .is_spent());
    assert_eq!(
        chain.get_utxo(&tx.hash_hex().unwrap(), 0).unwrap().get_amount(),
        1000
    );
}

#[test]
fn test_foreign_genesis_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    {
        let stores = SledStores::open(dir.path()).unwrap();
        let key = KeyPair::generate().unwrap();
        let root = MerkleTree::transactions_root(&[]).unwrap();
        let mut fake = Block::new(Header::new(0, vec![], root, 0), vec![]);
        fake.sign(&key).unwrap();
        stores.block_store().unwrap().put(&fake).unwrap();
    }

    let stores = SledStores::open(dir.path()).unwrap();
    let result = Chain::with_stores(
        Box::new(stores.block_store().unwrap()),
        Box::new(stores.tx_store().unwrap()),
        Box::new(stores.utxo_store().unwrap()),
    );
    assert!(matches!(result, Err(LedgerError::Validation(_))));
}
